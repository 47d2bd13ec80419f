//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use fairsea_core::{
    FairseaConfig, FileSource, PipelineRegistry, PromptFamily, Record, RecordSource,
    discover_families, prepare_records,
};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            input,
            family,
            all,
            output,
            raw_outputs,
            offline,
        } => {
            let mut config = load(workspace, config_file)?;
            if offline {
                config.reference.enabled = false;
            }
            let family = if all { None } else { family };
            handle_run(&config, &input, family.as_deref(), output.as_deref(), raw_outputs)
        }
        Commands::Families { input } => handle_families(&input),
        Commands::Sample { input, family } => {
            let config = load(workspace, config_file)?;
            handle_sample(&config, &input, &family)
        }
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn load(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<FairseaConfig> {
    fairsea_core::load_config(Some(workspace), config_file, None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn load_records(input: &Path, raw_outputs: bool) -> anyhow::Result<Vec<Record>> {
    let records = FileSource::new(input)?.load()?;
    if raw_outputs {
        Ok(records)
    } else {
        Ok(prepare_records(&records))
    }
}

fn handle_run(
    config: &FairseaConfig,
    input: &Path,
    family: Option<&str>,
    output: Option<&Path>,
    raw_outputs: bool,
) -> anyhow::Result<()> {
    let records = load_records(input, raw_outputs)?;
    let registry = PipelineRegistry::from_config(config)?;

    let json = match family {
        Some(code) => {
            let family: PromptFamily = code.parse()?;
            let bundle = registry.run(family, &records)?;
            serde_json::to_string_pretty(&bundle)?
        }
        None => {
            let outcomes = registry.run_all(&records);
            if outcomes.is_empty() {
                anyhow::bail!(
                    "No known prompt families in {}. Expected prefixes: {}",
                    input.display(),
                    known_codes()
                );
            }
            if outcomes.values().all(Result::is_err) {
                let reasons: Vec<String> = outcomes
                    .iter()
                    .filter_map(|(family, outcome)| {
                        outcome.as_ref().err().map(|e| format!("{family}: {e}"))
                    })
                    .collect();
                anyhow::bail!("Every pipeline failed:\n  {}", reasons.join("\n  "));
            }
            let mut document = serde_json::Map::new();
            for (family, outcome) in outcomes {
                let value = match outcome {
                    Ok(bundle) => serde_json::to_value(&bundle)?,
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                document.insert(family.to_string(), value);
            }
            serde_json::to_string_pretty(&document)?
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!(path = %path.display(), bytes = json.len(), "Wrote result bundle");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn known_codes() -> String {
    PromptFamily::ALL
        .iter()
        .map(|f| f.code())
        .collect::<Vec<_>>()
        .join(", ")
}

fn handle_families(input: &Path) -> anyhow::Result<()> {
    let records = load_records(input, true)?;
    let discovery = discover_families(&records);
    if discovery.known.is_empty() && discovery.unknown.is_empty() {
        println!("No records found in {}.", input.display());
        return Ok(());
    }
    println!("Prompt families ({}):", discovery.known.len());
    for family in &discovery.known {
        let count = records.iter().filter(|r| family.matches(r)).count();
        println!("  {} {:>6}  {}", family, count, family.description());
    }
    if !discovery.unknown.is_empty() {
        println!("Without a pipeline: {}", discovery.unknown.join(", "));
    }
    Ok(())
}

fn handle_sample(config: &FairseaConfig, input: &Path, family: &str) -> anyhow::Result<()> {
    let family: PromptFamily = family.parse()?;
    let records = load_records(input, false)?;
    let mut config = config.clone();
    config.reference.enabled = false;
    let registry = PipelineRegistry::from_config(&config)?;
    let rows = registry.sample(family, &records)?;
    if rows.is_empty() {
        println!("No {} records in {}.", family, input.display());
        return Ok(());
    }
    for (i, row) in rows.iter().enumerate() {
        println!("[{}] {}", i + 1, row.prompt_text);
        println!("    -> {}", row.llm_output);
    }
    Ok(())
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".fairsea").join("config.toml")
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&FairseaConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dataset(dir: &Path) -> PathBuf {
        let path = dir.join("records.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "prompt_id_full,prompt_text,llm_output,Gender,Race,Nationality"
        )
        .unwrap();
        for i in 0..12 {
            let gender = if i % 2 == 0 { "Female" } else { "Male" };
            let output = if i % 3 == 0 { "\"Yes.\"" } else { "\"No, not suitable\"" };
            writeln!(file, "I3-{i},Hire them?,{output},{gender},Chinese,Singaporean").unwrap();
        }
        writeln!(file, "Z1-1,p,o,Male,Chinese,Singaporean").unwrap();
        path
    }

    #[test]
    fn test_config_init_then_show() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, dir.path(), None).unwrap();
        assert!(workspace_config_path(dir.path()).exists());

        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path(), None).is_ok());
    }

    #[test]
    fn test_run_writes_bundle() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dataset(dir.path());
        let output = dir.path().join("out.json");
        let command = Commands::Run {
            input,
            family: Some("I3".into()),
            all: false,
            output: Some(output.clone()),
            raw_outputs: false,
            offline: true,
        };
        handle_command(command, dir.path(), None).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["is_continuous"], false);
        assert!(json["sentiment_summary"].is_array());
        assert!(json["demographic"]["Gender"].is_object());
    }

    #[test]
    fn test_run_all_keys_by_family() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dataset(dir.path());
        let output = dir.path().join("all.json");
        let command = Commands::Run {
            input,
            family: None,
            all: true,
            output: Some(output.clone()),
            raw_outputs: false,
            offline: true,
        };
        handle_command(command, dir.path(), None).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(json.get("I3").is_some());
        assert!(json.get("Z1").is_none());
    }

    #[test]
    fn test_run_all_reports_failed_family_and_keeps_others() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dataset(dir.path());
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&input).unwrap();
            for i in 0..4 {
                writeln!(file, "D1-{i},Critique them,too bossy,Female,Malay,Singaporean").unwrap();
            }
        }
        // unreachable embedding endpoint: only the embedding family fails
        let config_dir = dir.path().join(".fairsea");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            "[embedding]\nprovider = \"ollama\"\nbase_url = \"http://127.0.0.1:9\"\ntimeout_secs = 2\n",
        )
        .unwrap();
        let output = dir.path().join("partial.json");
        let command = Commands::Run {
            input,
            family: None,
            all: true,
            output: Some(output.clone()),
            raw_outputs: false,
            offline: true,
        };
        handle_command(command, dir.path(), None).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert!(json["D1"]["error"].is_string());
        assert!(json["D1"].get("demographic").is_none());
        assert_eq!(json["I3"]["is_continuous"], false);
        assert!(json["I3"]["sentiment_summary"].is_array());
    }

    #[test]
    fn test_unknown_family_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dataset(dir.path());
        let command = Commands::Sample {
            input,
            family: "Q5".into(),
        };
        assert!(handle_command(command, dir.path(), None).is_err());
    }

    #[test]
    fn test_families_lists_prefixes() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dataset(dir.path());
        assert!(handle_command(Commands::Families { input }, dir.path(), None).is_ok());
    }
}
