use super::{RunReport, Step};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// In-memory sink handed out by [`Console::capture`].
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where run milestones, results and errors are printed.
///
/// Human mode mirrors the shell-style lines (`label` followed by pretty JSON); JSON mode
/// prints one object per line with an `event` field.
pub struct Console {
    mode: OutputMode,
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl Console {
    #[must_use]
    pub fn stdio(mode: OutputMode) -> Self {
        Self { mode, out: Box::new(io::stdout()), err: Box::new(io::stderr()) }
    }

    /// A console writing into buffers, returned as `(console, stdout, stderr)`.
    #[must_use]
    pub fn capture(mode: OutputMode) -> (Self, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        (Self { mode, out: Box::new(out.clone()), err: Box::new(err.clone()) }, out, err)
    }

    #[must_use]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    // Console write failures (closed pipe) are logged, never fatal.
    fn emit(&mut self, to_err: bool, line: &str) {
        let w = if to_err { &mut self.err } else { &mut self.out };
        if let Err(e) = writeln!(w, "{line}").and_then(|()| w.flush()) {
            log::warn!("console write failed: {e}");
        }
    }

    fn emit_json(&mut self, to_err: bool, v: &Value) {
        let line = v.to_string();
        self.emit(to_err, &line);
    }

    pub fn milestone(&mut self, event: &str, message: &str) {
        match self.mode {
            OutputMode::Human => self.emit(false, message),
            OutputMode::Json => self.emit_json(false, &json!({"event": event, "message": message})),
        }
    }

    /// A step's result: a label line followed by the pretty-printed data.
    pub fn result(&mut self, step: Step, label: &str, data: &Value) {
        match self.mode {
            OutputMode::Human => {
                let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
                if label.is_empty() {
                    self.emit(false, &pretty);
                } else {
                    self.emit(false, &format!("{label} {pretty}"));
                }
            }
            OutputMode::Json => self.emit_json(
                false,
                &json!({"event": "result", "step": step.label(), "message": label.trim_end(), "data": data}),
            ),
        }
    }

    /// A step that finished without data to show.
    pub fn done(&mut self, step: Step, message: &str) {
        match self.mode {
            OutputMode::Human => self.emit(false, message),
            OutputMode::Json => {
                self.emit_json(false, &json!({"event": "result", "step": step.label(), "message": message}));
            }
        }
    }

    pub fn error(&mut self, step: Option<Step>, message: &str) {
        match self.mode {
            OutputMode::Human => self.emit(true, &format!("Error: {message}")),
            OutputMode::Json => self.emit_json(
                true,
                &json!({"event": "error", "step": step.map(Step::label), "message": message}),
            ),
        }
    }

    /// Final report; printed in JSON mode only.
    pub fn report(&mut self, report: &RunReport) {
        if self.mode == OutputMode::Json {
            match serde_json::to_value(report) {
                Ok(mut v) => {
                    v["event"] = Value::String("report".into());
                    self.emit_json(false, &v);
                }
                Err(e) => log::warn!("could not serialize run report: {e}"),
            }
        }
    }
}
