//! Terminal layout renderer.
//!
//! Draws one report frame per iteration, either refreshing a fixed region in
//! place with line-relative cursor movement or appending blocks in
//! sequential mode. Only relative commands are used (`MoveToPreviousLine`,
//! `MoveToNextLine`, `MoveToColumn(0)`, clear-to-end-of-line), so the report
//! stays correct at any terminal width and under plain scrollback.

use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveToNextLine, MoveToPreviousLine};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::config::RunConfig;
use crate::format::{SEPARATOR, format_gb, format_session, gb};
use crate::metrics::OsIdentity;
use crate::sampler::{Frame, PriorState};

pub mod graph;

const MEMORY_HEADER: &str = "### Memory ### (Phys.Used/Tot -- Virtual Used/Tot)";
const SESSIONS_HEADER: &str = "### Sessions/users ###";
const SYSINFO_HEADER: &str = "### System Information ###";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Overwrite the fixed report region in place each iteration.
    Refresh,
    /// Append each iteration's full block; no cursor movement at all.
    Sequential,
}

/// Where the cursor is, counted in rows from the top of the report.
///
/// `rows` is the number of rows the report occupies; the cursor is "parked"
/// when it sits on the blank row just below them. Every frame starts and
/// ends parked, which is the net-zero displacement invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderState {
    pub cursor_row: usize,
    pub rows: usize,
    at_col0: bool,
}

/// Row offsets of the fixed report region for a given section set and
/// session count. Row 0 is the run header, row 1 the runtime memory line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    pub runtime: usize,
    pub memory_line: Option<usize>,
    pub sessions_start: Option<usize>,
    pub cpu_line: Option<usize>,
    /// One past the last fixed-region row; graph history begins here.
    pub fixed_rows: usize,
}

pub(crate) fn layout(show_system: bool, show_users: bool, session_rows: usize) -> Layout {
    let mut next = 2;
    let mut out = Layout {
        runtime: 1,
        memory_line: None,
        sessions_start: None,
        cpu_line: None,
        fixed_rows: 0,
    };
    if show_system {
        // separator, memory header, memory line
        out.memory_line = Some(next + 2);
        next += 3;
    }
    if show_users {
        // separator, sessions header, session rows
        out.sessions_start = Some(next + 2);
        next += 2 + session_rows;
    }
    if show_system {
        // separator, cores line, cpu line
        out.cpu_line = Some(next + 2);
        next += 3;
    }
    out.fixed_rows = next;
    out
}

pub struct Renderer<W: Write> {
    out: W,
    mode: Mode,
    show_system: bool,
    show_users: bool,
    graphs: bool,
    samples: u32,
    tdelay_secs: u64,
    state: RenderState,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, config: &RunConfig) -> Self {
        Self {
            out,
            mode: if config.sequential {
                Mode::Sequential
            } else {
                Mode::Refresh
            },
            show_system: config.show_system,
            show_users: config.show_users,
            graphs: config.graphs,
            samples: config.samples,
            tdelay_secs: config.tdelay_secs,
            state: RenderState {
                at_col0: true,
                ..RenderState::default()
            },
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints the run header. Must be called once before the first frame.
    pub fn begin(&mut self) -> io::Result<()> {
        let header = format!(
            "Nbr of samples: {} -- every {} secs",
            self.samples, self.tdelay_secs
        );
        self.put(0, &header)?;
        self.out.flush()
    }

    /// Draws one frame and returns the state carried into the next
    /// iteration. The cursor is parked below all content afterwards.
    pub fn draw(&mut self, frame: &Frame, prior: PriorState) -> io::Result<PriorState> {
        #[cfg(feature = "sample-tracing")]
        let _span = tracing::debug_span!("render.draw", index = frame.index).entered();

        let sessions = self.session_lines(frame);
        match self.mode {
            Mode::Refresh => self.draw_refresh(frame, &prior, &sessions)?,
            Mode::Sequential => self.draw_sequential(frame, &prior, &sessions)?,
        }
        self.out.flush()?;
        debug_assert_eq!(self.state.cursor_row, self.state.rows);

        let current_gb = frame.memory.as_ref().ok().map(|m| gb(m.physical_used));
        Ok(PriorState {
            physical_used_gb: current_gb.or(prior.physical_used_gb),
            session_rows: sessions.len(),
        })
    }

    /// Emits the trailing OS-identity block, once, after the last frame.
    pub fn finish(&mut self, identity: &OsIdentity) -> io::Result<()> {
        self.park()?;
        self.append(SEPARATOR)?;
        self.append(SYSINFO_HEADER)?;
        self.append(&format!(" System Name = {}", identity.name))?;
        self.append(&format!(" Machine Name = {}", identity.host))?;
        self.append(&format!(" Version = {}", identity.version))?;
        self.append(&format!(" Release = {}", identity.release))?;
        self.append(&format!(" Architecture = {}", identity.arch))?;
        self.append(SEPARATOR)?;
        self.out.flush()
    }

    /// Leaves the cursor on a clean blank line below the report. Abort
    /// paths call this so later output never overlaps the last frame.
    pub fn finish_line(&mut self) -> io::Result<()> {
        self.park()?;
        self.out.flush()
    }

    fn draw_refresh(
        &mut self,
        frame: &Frame,
        prior: &PriorState,
        sessions: &[String],
    ) -> io::Result<()> {
        let current = layout(self.show_system, self.show_users, sessions.len());
        let previous = layout(self.show_system, self.show_users, prior.session_rows);
        let first = self.state.rows <= 1;

        self.put(current.runtime, &runtime_text(frame))?;

        if let Some(row) = current.memory_line {
            if first {
                self.put(row - 2, SEPARATOR)?;
                self.put(row - 1, MEMORY_HEADER)?;
            }
            self.put(row, &memory_text(frame))?;
        }

        if let Some(start) = current.sessions_start {
            if first {
                self.put(start - 2, SEPARATOR)?;
                self.put(start - 1, SESSIONS_HEADER)?;
            }
            for (i, line) in sessions.iter().enumerate() {
                self.put(start + i, line)?;
            }
        }

        // The trailer shifts with the session count, so it is rewritten
        // every frame. Skip from the session block to the cpu line is the
        // current session count plus the two trailer rows above it.
        if let Some(row) = current.cpu_line {
            self.put(row - 2, SEPARATOR)?;
            self.put(row - 1, &cores_text(frame))?;
            self.put(row, &cpu_text(frame))?;
        }

        // Rows vacated by a shrinking session list.
        if !first && previous.fixed_rows > current.fixed_rows {
            let end = previous.fixed_rows.min(self.state.rows);
            for row in current.fixed_rows..end {
                self.clear_row(row)?;
            }
        }

        // Graph lines are history: appended below everything, never
        // overwritten.
        if self.graphs && self.show_system {
            self.park()?;
            self.append(&memory_graph_text(frame, prior))?;
            self.append(&cpu_graph_text(frame))?;
        }

        self.park()
    }

    fn draw_sequential(
        &mut self,
        frame: &Frame,
        prior: &PriorState,
        sessions: &[String],
    ) -> io::Result<()> {
        self.append(&format!(">>> iteration {}", frame.index))?;
        self.append(&runtime_text(frame))?;

        if self.show_system {
            self.append(SEPARATOR)?;
            self.append(MEMORY_HEADER)?;
            self.append(&memory_text(frame))?;
            if self.graphs {
                self.append(&memory_graph_text(frame, prior))?;
            }
        }

        if self.show_users {
            self.append(SEPARATOR)?;
            self.append(SESSIONS_HEADER)?;
            for line in sessions {
                self.append(line)?;
            }
        }

        if self.show_system {
            self.append(SEPARATOR)?;
            self.append(&cores_text(frame))?;
            self.append(&cpu_text(frame))?;
            if self.graphs {
                self.append(&cpu_graph_text(frame))?;
            }
        }
        Ok(())
    }

    /// Session rows for this frame: formatted entries, or a single degraded
    /// placeholder when the accessor failed. Empty when the section is off.
    fn session_lines(&self, frame: &Frame) -> Vec<String> {
        if !self.show_users {
            return Vec::new();
        }
        match &frame.sessions {
            Ok(sessions) => sessions.iter().map(format_session).collect(),
            Err(_) => vec![" sessions unavailable".to_string()],
        }
    }

    /// Writes `text` on `row`, rewriting in place or appending when `row`
    /// is the first blank row. The cursor ends on that row.
    fn put(&mut self, row: usize, text: &str) -> io::Result<()> {
        debug_assert!(row <= self.state.rows, "write past the report bottom");
        self.move_to_row(row)?;
        if row == self.state.rows {
            // A fresh bottom row; in refresh mode it may still hold stale
            // glyphs from an earlier, taller frame.
            if self.mode == Mode::Refresh {
                queue!(self.out, Clear(ClearType::UntilNewLine))?;
            }
            queue!(self.out, Print(text), Print("\n"))?;
            self.state.rows += 1;
            self.state.cursor_row = self.state.rows;
            self.state.at_col0 = true;
        } else {
            queue!(self.out, Clear(ClearType::UntilNewLine), Print(text))?;
            self.state.at_col0 = false;
        }
        Ok(())
    }

    fn append(&mut self, text: &str) -> io::Result<()> {
        let bottom = self.state.rows;
        self.put(bottom, text)
    }

    fn clear_row(&mut self, row: usize) -> io::Result<()> {
        self.move_to_row(row)?;
        queue!(self.out, Clear(ClearType::UntilNewLine))
    }

    fn park(&mut self) -> io::Result<()> {
        let bottom = self.state.rows;
        self.move_to_row(bottom)
    }

    /// Moves the cursor to `row` with line-relative commands only. The
    /// target must already exist on screen (row <= rows).
    fn move_to_row(&mut self, row: usize) -> io::Result<()> {
        match row.cmp(&self.state.cursor_row) {
            std::cmp::Ordering::Less => {
                let up = (self.state.cursor_row - row) as u16;
                queue!(self.out, MoveToPreviousLine(up))?;
                self.state.at_col0 = true;
            }
            std::cmp::Ordering::Greater => {
                let down = (row - self.state.cursor_row) as u16;
                queue!(self.out, MoveToNextLine(down))?;
                self.state.at_col0 = true;
            }
            std::cmp::Ordering::Equal => {
                if !self.state.at_col0 {
                    queue!(self.out, MoveToColumn(0))?;
                    self.state.at_col0 = true;
                }
            }
        }
        self.state.cursor_row = row;
        Ok(())
    }
}

fn runtime_text(frame: &Frame) -> String {
    match &frame.runtime_kb {
        Ok(kb) => format!(" Memory usage: {kb} kilobytes"),
        Err(_) => " Memory usage: unavailable".to_string(),
    }
}

fn memory_text(frame: &Frame) -> String {
    match &frame.memory {
        Ok(m) => format!(
            "{} / {}  -- {} / {}",
            format_gb(m.physical_used),
            format_gb(m.physical_total),
            format_gb(m.virtual_used),
            format_gb(m.virtual_total),
        ),
        Err(_) => " memory unavailable".to_string(),
    }
}

fn cores_text(frame: &Frame) -> String {
    format!("Number of cores: {}", frame.cores)
}

fn cpu_text(frame: &Frame) -> String {
    match &frame.cpu {
        Ok(sample) => format!(" total cpu use = {:.2}%", sample.percent),
        Err(_) => " total cpu use = unavailable".to_string(),
    }
}

fn memory_graph_text(frame: &Frame, prior: &PriorState) -> String {
    match &frame.memory {
        Ok(m) => format!(
            "  {}",
            graph::memory_delta(gb(m.physical_used), prior.physical_used_gb)
        ),
        Err(_) => "  (memory delta unavailable)".to_string(),
    }
}

fn cpu_graph_text(frame: &Frame) -> String {
    match &frame.cpu {
        Ok(sample) => format!("\t{}", graph::cpu_bar(sample.percent)),
        Err(_) => "\t(cpu graph unavailable)".to_string(),
    }
}
