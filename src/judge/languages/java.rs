use crate::judge::profile::{CommandTemplate, CompileFailure, LanguageProfile};

/// Submissions must declare `public class Main`; the file is written as
/// `Main.java` so javac accepts it.
pub fn profile() -> LanguageProfile {
    LanguageProfile {
        id: "java".to_string(),
        aliases: Vec::new(),
        source_file_extension: "java".to_string(),
        source_file_stem: "Main".to_string(),
        compile_command: Some(CommandTemplate::new([
            "javac",
            "-encoding",
            "UTF-8",
            "-d",
            "{workdir}",
            "{source}",
        ])),
        compile_failure: CompileFailure::CompileError,
        run_command: CommandTemplate::new([
            "java",
            "-Xss64m",
            "-XX:+UseSerialGC",
            "-Dfile.encoding=UTF-8",
            "-cp",
            "{workdir}",
            "{stem}",
        ]),
        compiled_artifact_extensions: vec!["class".to_string()],
    }
}
