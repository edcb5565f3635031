use std::path::PathBuf;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{error, info};

use hair_style_studio::config::Config;
use hair_style_studio::diagnosis::DiagnosisRequest;
use hair_style_studio::error::WorkflowError;
use hair_style_studio::utils::logging::init_logging;
use hair_style_studio::workflow::StyleWorkflow;

#[derive(Debug, Default)]
struct RunArgs {
    request_path: PathBuf,
    style: Option<String>,
    color: Option<String>,
    customization: Option<String>,
    refinements: Vec<String>,
    switch_variant: bool,
    output_path: PathBuf,
}

fn usage() -> &'static str {
    "Usage: hair_style_studio <request.json> [--style <style1|style2>] [--color <color1|color2>] [--customize <text>] [--refine <text>]... [--switch-variant] [--out <path>]"
}

fn parse_run_args(args: &[String]) -> anyhow::Result<RunArgs> {
    let mut request_path: Option<PathBuf> = None;
    let mut parsed = RunArgs {
        output_path: PathBuf::from("style.png"),
        ..RunArgs::default()
    };

    let mut index = 1;
    while index < args.len() {
        let flag = args[index].as_str();
        let mut value = |name: &str| -> anyhow::Result<String> {
            index += 1;
            args.get(index)
                .cloned()
                .ok_or_else(|| anyhow!("Missing value for {name}"))
        };
        match flag {
            "--style" => parsed.style = Some(value("--style")?),
            "--color" => parsed.color = Some(value("--color")?),
            "--customize" => parsed.customization = Some(value("--customize")?),
            "--refine" => parsed.refinements.push(value("--refine")?),
            "--out" => parsed.output_path = PathBuf::from(value("--out")?),
            "--switch-variant" => parsed.switch_variant = true,
            "--help" | "-h" => return Err(anyhow!(usage())),
            other if other.starts_with("--") => {
                return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
            }
            path => {
                if request_path.replace(PathBuf::from(path)).is_some() {
                    return Err(anyhow!("Only one request file may be given\n{}", usage()));
                }
            }
        }
        index += 1;
    }

    parsed.request_path = request_path.ok_or_else(|| anyhow!(usage()))?;
    if parsed.style.is_some() != parsed.color.is_some() {
        return Err(anyhow!("--style and --color must be given together"));
    }
    Ok(parsed)
}

fn report(err: WorkflowError) -> anyhow::Error {
    error!(
        "Step {} failed ({:?}): {}",
        err.step,
        err.category(),
        err
    );
    anyhow!("{}\n{}", err.user_message(), err)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let config = Config::from_env().context("Configuration error")?;
    let _guards = init_logging(&config.log_level, &config.log_dir);

    let args: Vec<String> = std::env::args().collect();
    let run = parse_run_args(&args)?;

    let raw = tokio::fs::read_to_string(&run.request_path)
        .await
        .with_context(|| format!("Failed to read {}", run.request_path.display()))?;
    let request: DiagnosisRequest =
        serde_json::from_str(&raw).context("Request file is not a valid diagnosis request")?;

    let mut workflow = StyleWorkflow::from_config(request, &config).map_err(report)?;
    info!("Starting session {}", workflow.session().session_id);

    workflow.prepare_attachments().await.map_err(report)?;
    let diagnosis = workflow.diagnose().await.map_err(report)?;
    println!("{}", serde_json::to_string_pretty(diagnosis)?);

    let (Some(style), Some(color)) = (run.style.as_deref(), run.color.as_deref()) else {
        return Ok(());
    };
    workflow.select_hairstyle(style).map_err(report)?;
    workflow.select_haircolor(color).map_err(report)?;
    workflow
        .generate_image(run.customization.as_deref())
        .await
        .map_err(report)?;

    for instruction in &run.refinements {
        workflow.refine_image(instruction).await.map_err(report)?;
    }
    if run.switch_variant {
        workflow.switch_variant().await.map_err(report)?;
    }

    if let Some(image) = workflow.current_image() {
        tokio::fs::write(&run.output_path, &image.data)
            .await
            .with_context(|| format!("Failed to write {}", run.output_path.display()))?;
        info!(
            "Wrote {} ({} bytes, {})",
            run.output_path.display(),
            image.data.len(),
            image.mime_type
        );
    }
    Ok(())
}
