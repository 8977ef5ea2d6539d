use crate::judge::profile::{CommandTemplate, CompileFailure, LanguageProfile};

pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "rust".to_string(),
        aliases: vec!["rs".to_string()],
        source_file_extension: "rs".to_string(),
        source_file_stem: "main".to_string(),
        compile_command: Some(CommandTemplate::new([
            "rustc",
            "--edition=2021",
            "-O",
            "-o",
            "{artifact}",
            "{source}",
        ])),
        compile_failure: CompileFailure::CompileError,
        run_command: CommandTemplate::new(["{artifact}"]),
        compiled_artifact_extensions: vec!["pdb".to_string(), "d".to_string()],
    }
}
