use std::io;
use std::sync::OnceLock;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};
use wasm_bindgen::JsValue;

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Buffers one formatted event and hands it to `console.log` on drop.
pub struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            web_sys::console::log_1(&JsValue::from_str(line));
        }
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buf: Vec::new() }
    }
}

/// Parses `EnvFilter` directives, e.g. `"info,globe=debug"`.
pub fn filter_for(directives: &str) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(directives)
}

/// Installs the console subscriber once. The filter sits behind a reload
/// layer so [`set_directives`] can replace it later.
pub fn init_tracing(directives: &str) {
    let filter = filter_for(directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, handle) = reload::Layer::new(filter);
    // Wall-clock timestamps are unavailable on wasm32-unknown-unknown.
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(MakeConsoleWriter)
        .without_time()
        .with_target(true);
    match tracing_subscriber::registry().with(filter).with(fmt).try_init() {
        Ok(()) => {
            let _ = FILTER.set(handle);
        }
        Err(err) => {
            web_sys::console::warn_1(&JsValue::from_str(&format!("tracing already installed: {err}")));
        }
    }
}

/// Swaps the live filter for `directives`. Fails on unparsable directives
/// or when [`init_tracing`] has not installed the subscriber.
pub fn set_directives(directives: &str) -> Result<(), String> {
    let filter = filter_for(directives).map_err(|e| e.to_string())?;
    let handle = FILTER.get().ok_or_else(|| "console subscriber not installed".to_string())?;
    handle.reload(filter).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse_per_target() {
        assert!(filter_for("info,globe=debug").is_ok());
        assert!(filter_for("globe=verbose").is_err());
    }

    #[test]
    fn set_directives_rejects_bad_input_before_touching_the_filter() {
        let err = set_directives("streaming=loud").unwrap_err();
        assert!(!err.contains("not installed"), "{err}");
    }

    #[test]
    fn set_directives_needs_an_installed_subscriber() {
        assert_eq!(
            set_directives("info,globe=debug"),
            Err("console subscriber not installed".to_string())
        );
    }
}
