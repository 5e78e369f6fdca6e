use alder::{Session, SessionConfig};

/// Thin CLI entry point: reads a path, compiles it in a fresh session,
/// and prints diagnostics. File I/O and argument handling here are not
/// the subject of this crate — `Session` is.
pub fn main() {
    let path = std::env::args_os().nth(1).expect("Usage: alder <path>");

    let mut session = Session::new(SessionConfig::default());
    match session.compile_file(&path) {
        Ok(module_id) => {
            log::debug!("compiled module {module_id}");
        }
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }

    for diagnostic in session.diagnostics().entries() {
        eprintln!("{diagnostic}");
    }

    if session.diagnostics().is_fatal() {
        std::process::exit(1);
    }
}
