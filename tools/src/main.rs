//! seg-runner: headless customer segmentation runner.
//!
//! Usage:
//!   seg-runner seed     --db shop.db --customers 500 --seed 42
//!   seg-runner run      --db shop.db --algorithm kmeans --param n_clusters=4 --name spring --save
//!   seg-runner classify --db shop.db --run-id 3
//!   seg-runner history  --db shop.db
//!   seg-runner members  --db shop.db --run-id 3 --label 0
//!   seg-runner delete   --db shop.db --run-id 3
//!   seg-runner rlfm     --db shop.db [--recompute] [--offset 0 --limit 100]
//!   seg-runner summary  --db shop.db
//!
//! Every command prints one JSON document to stdout.

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use segment_core::{
    config::PipelineConfig,
    demo_data,
    error::SegError,
    pipeline::{Pipeline, RunRequest},
    store::SegStore,
    types::{ClusterLabel, RunId},
};
use serde_json::{json, Map, Value};
use std::{env, path::Path, process::ExitCode};

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match run(&args) {
        Ok(out) => {
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_else(|_| out.to_string()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = e
                .downcast_ref::<SegError>()
                .map(|s| format!("{:?}", s.kind()))
                .unwrap_or_else(|| "Usage".to_string());
            eprintln!("{}", json!({ "error": e.to_string(), "kind": kind }));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<Value> {
    let command = args
        .get(1)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing command (seed|run|classify|history|members|delete|rlfm|summary)"))?;
    let db = flag(args, "--db").unwrap_or("segments.db");
    let data_dir = flag(args, "--data-dir").unwrap_or("./data");

    let mut config = if Path::new(data_dir).join("pipeline.json").exists() {
        PipelineConfig::load(data_dir)?
    } else {
        log::warn!("no pipeline.json under {data_dir}; using built-in defaults");
        PipelineConfig::default()
    };
    if let Some(dir) = flag(args, "--model-store") {
        config.model_store_dir = dir.to_string();
    }

    let store = SegStore::open(db)?;
    store.migrate()?;
    let pipeline = Pipeline::new(store, config);

    let out = match command {
        "seed" => {
            let customers = parse_arg(args, "--customers", 200usize);
            let seed = parse_arg(args, "--seed", pipeline.config().seed);
            let stats =
                demo_data::seed_demo_transactions(pipeline.store(), customers, seed, Utc::now())?;
            serde_json::to_value(stats)?
        }
        "run" => {
            let algorithm = flag(args, "--algorithm").unwrap_or("kmeans");
            let name = flag(args, "--name").unwrap_or("cli-run");
            let request = RunRequest::new(algorithm, name)
                .parameters(params(args))
                .between(date(args, "--start")?, date(args, "--end")?)
                .save(args.iter().any(|a| a == "--save"));
            serde_json::to_value(pipeline.run_pipeline(&request)?)?
        }
        "classify" => serde_json::to_value(pipeline.classify_run(run_id(args)?)?)?,
        "history" => serde_json::to_value(pipeline.list_runs()?)?,
        "members" => {
            let label: ClusterLabel = flag(args, "--label")
                .ok_or_else(|| anyhow!("--label is required"))?
                .parse()?;
            serde_json::to_value(pipeline.cluster_customers(run_id(args)?, label)?)?
        }
        "delete" => {
            let id = run_id(args)?;
            pipeline.delete_run(id)?;
            json!({ "deleted": id })
        }
        "rlfm" => {
            if args.iter().any(|a| a == "--recompute") {
                let written = pipeline.recompute_rlfm_snapshot()?;
                log::info!("rlfm: {written} rows written");
            }
            let offset = parse_arg(args, "--offset", 0usize);
            let limit = parse_arg(args, "--limit", 100usize);
            serde_json::to_value(pipeline.rlfm_snapshot(offset, limit)?)?
        }
        "summary" => json!({
            "summary": pipeline.data_summary()?,
            "monthly_revenue": pipeline.monthly_revenue()?,
            "categories": pipeline.category_breakdown()?,
        }),
        other => return Err(anyhow!("unknown command '{other}'")),
    };
    Ok(out)
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn run_id(args: &[String]) -> Result<RunId> {
    Ok(flag(args, "--run-id")
        .ok_or_else(|| anyhow!("--run-id is required"))?
        .parse()?)
}

fn date(args: &[String], name: &str) -> Result<Option<NaiveDate>> {
    flag(args, name)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| anyhow!("{name} '{s}' is not YYYY-MM-DD: {e}"))
        })
        .transpose()
}

/// Every `--param key=value`. Values that parse as JSON keep their type.
fn params(args: &[String]) -> Map<String, Value> {
    args.windows(2)
        .filter(|w| w[0] == "--param")
        .filter_map(|w| w[1].split_once('='))
        .map(|(k, v)| {
            let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
            (k.to_string(), value)
        })
        .collect()
}
