//! Offline rendering of a saved raw answer.

use std::error::Error;
use std::fs;
use std::path::Path;

use crate::cli::export_table;
use crate::cli::output::Printer;
use crate::core::assembly::ResponseAssembly;
use crate::core::config::Config;
use crate::core::export::ExportFormat;
use crate::core::prompt::Language;
use crate::ui::paint::paint_response;
use crate::ui::theme::Theme;

pub fn run_render(
    file: &Path,
    language: Option<Language>,
    export: Option<ExportFormat>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let raw = fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {e}", file.display()))?;

    let mut assembly = ResponseAssembly::new();
    assembly.push_fragment(&raw, Vec::new());
    let snapshot = assembly.snapshot(false);

    let language = language.unwrap_or_else(|| config.prompt_settings().language);
    let mut printer = Printer::new();
    let width = printer.width();
    printer.print(paint_response(
        &snapshot,
        language,
        width,
        &Theme::for_current_terminal(),
    ))?;

    if let Some(format) = export {
        export_table(&snapshot, format, config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_exports_saved_answer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let answer = dir.path().join("answer.md");
        fs::write(
            &answer,
            "Result\n```json\n{\"type\":\"comparison_data\",\"headers\":[\"Product\"],\"rows\":[[\"A\"]]}\n```",
        )
        .unwrap();
        let config = Config {
            export_dir: Some(dir.path().join("exports")),
            ..Config::default()
        };

        run_render(&answer, Some(Language::En), Some(ExportFormat::Csv), &config)
            .expect("render");

        let exported: Vec<_> = fs::read_dir(dir.path().join("exports"))
            .expect("export dir")
            .collect();
        assert_eq!(exported.len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let config = Config::default();
        assert!(run_render(Path::new("/nonexistent/answer.md"), None, None, &config).is_err());
    }
}
