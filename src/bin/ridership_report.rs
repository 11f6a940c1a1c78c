use std::collections::BTreeSet;

use ridership::{
    entries_per_hour_block, init_logging, log_app_start, logging_config_from_env,
    mean_entries_by_weekday, output_dir_from_env, read_daily_csv, read_hourly_csv, top_k_from_env,
    top_stations_by_borough, write_rows, Borough, OutputPaths, StationRanking,
    HOUR_BLOCKS_FILE_NAME, TOP_STATIONS_FILE_NAME, WEEKDAY_MEANS_FILE_NAME,
};

const DEFAULT_TOP_K: usize = 10;
const REPORT_BOROUGHS: [Borough; 3] = [Borough::Manhattan, Borough::Brooklyn, Borough::Queens];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("ridership_report", &logging_cfg);

    let output_dir = output_dir_from_env();
    let top_k = top_k_from_env(DEFAULT_TOP_K)?;
    let inputs = OutputPaths::in_dir(&output_dir);
    let daily = read_daily_csv(&inputs.daily)?;
    let hourly = read_hourly_csv(&inputs.hourly)?;

    let top: Vec<StationRanking> = REPORT_BOROUGHS
        .into_iter()
        .flat_map(|borough| top_stations_by_borough(&daily, borough, top_k))
        .collect();
    let top_names: Vec<String> = top
        .iter()
        .map(|ranking| ranking.station.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let weekday = mean_entries_by_weekday(&daily);
    let blocks = entries_per_hour_block(&hourly, &top_names);

    write_rows(&output_dir.join(TOP_STATIONS_FILE_NAME), &top)?;
    write_rows(&output_dir.join(WEEKDAY_MEANS_FILE_NAME), &weekday)?;
    write_rows(&output_dir.join(HOUR_BLOCKS_FILE_NAME), &blocks)?;

    for ranking in &top {
        println!(
            "{:<3} {:<20} {:>12.1}",
            ranking.borough, ranking.station, ranking.mean_weekly_entries
        );
    }
    Ok(())
}
