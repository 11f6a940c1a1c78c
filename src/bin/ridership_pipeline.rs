use ridership::{
    init_logging, log_app_start, logging_config_from_env, pipeline_config_from_env, run_pipeline,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("ridership_pipeline", &logging_cfg);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = pipeline_config_from_env(&args)?;
    let report = run_pipeline(&cfg)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
