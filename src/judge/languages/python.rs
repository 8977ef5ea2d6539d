use crate::judge::profile::{CommandTemplate, CompileFailure, LanguageProfile};

/// CPython 3. The compile step is a byte-compile syntax check whose failure
/// counts as a runtime error, since interpreted programs have no build stage.
pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "python".to_string(),
        aliases: vec!["py".to_string(), "python3".to_string()],
        source_file_extension: "py".to_string(),
        source_file_stem: "main".to_string(),
        compile_command: Some(CommandTemplate::new([
            "python3",
            "-m",
            "py_compile",
            "{source}",
        ])),
        compile_failure: CompileFailure::RuntimeError,
        run_command: CommandTemplate::new(["python3", "-B", "{source}"]),
        compiled_artifact_extensions: vec!["pyc".to_string()],
    }
}
