use crate::judge::profile::{CommandTemplate, CompileFailure, LanguageProfile};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "cpp".to_string(),
        aliases: vec!["c++".to_string(), "cxx".to_string(), "cc".to_string()],
        source_file_extension: "cpp".to_string(),
        source_file_stem: "main".to_string(),
        compile_command: Some(CommandTemplate::new([
            "g++",
            "-std=c++17",
            "-O2",
            "-pipe",
            "-o",
            "{artifact}",
            "{source}",
        ])),
        compile_failure: CompileFailure::CompileError,
        run_command: CommandTemplate::new(["{artifact}"]),
        compiled_artifact_extensions: vec!["o".to_string()],
    }
}
