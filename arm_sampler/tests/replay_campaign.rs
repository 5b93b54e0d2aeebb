mod common;

use std::collections::HashSet;

use arm_sampler::config::{DriverConfig, HeightAxis, ReplayConfig, SampleSelection};
use arm_sampler::dataset::TrajectoryDataset;
use arm_sampler::driver::{RunOutcome, SimulationDriver};
use arm_sampler::errors::{CampaignError, DatasetError};
use arm_sampler::replay::{ReplayCampaign, ReplayState};
use common::{read_table, temp_csv, MockArm};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::SeedableRng;

const HEADER: &str = "x_rel,y_rel,z_rel,j1,j2,j3,j4";

fn quick_config() -> ReplayConfig {
    ReplayConfig {
        blend_duration: 0.1,
        settle_time: 0.05,
        inter_sample_delay: 0.02,
        ..Default::default()
    }
}

fn replay(config: ReplayConfig, csv: &str, tag: &str) -> ReplayCampaign<StdRng> {
    let dataset = TrajectoryDataset::parse_str(csv).unwrap();
    ReplayCampaign::new(config, dataset, StdRng::seed_from_u64(5), temp_csv(tag)).unwrap()
}

fn run(arm: &mut MockArm, campaign: &mut ReplayCampaign<StdRng>) -> RunOutcome {
    SimulationDriver::new(DriverConfig::default())
        .unwrap()
        .run(arm, campaign)
        .unwrap()
}

#[test]
fn tracking_arm_replays_with_no_error() {
    let csv = format!("{}\n0,0,0,0,0,0,0\n1,0,0,10,0,0,0\n", HEADER);
    let mut arm = MockArm::four_axis().with_base(Point3::new(0.5, -0.25, 0.1));
    let mut campaign = replay(quick_config(), &csv, "scenario_b");

    assert_eq!(run(&mut arm, &mut campaign), RunOutcome::Completed);
    assert_eq!(
        campaign.selected().iter().copied().collect::<HashSet<_>>(),
        HashSet::from([0, 1])
    );
    assert_eq!(campaign.points().len(), 2);
    for point in campaign.points() {
        assert!(point.error_m < 1e-9, "row {} error {}", point.row_index, point.error_m);
    }
    let stats = campaign.stats().unwrap();
    assert_eq!(stats.count, 2);
    assert!(stats.mean_m < 1e-9);
    assert_eq!(stats.within_15cm, 2);
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn low_end_effector_gives_header_only_report() {
    let csv = format!("{}\n0,0,0,0,0,0,0\n0,0,0.2,0,0,1,1\n", HEADER);
    let mut arm = MockArm::four_axis();
    let mut campaign = replay(quick_config(), &csv, "scenario_c");
    run(&mut arm, &mut campaign);

    assert_eq!(campaign.points().len(), 2);
    let content = std::fs::read_to_string(campaign.output_path()).unwrap();
    assert_eq!(content, "csv_index,distance_m\n");
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn report_keeps_only_high_samples() {
    // row 1 lands at z = 0.5, row 0 at z = 0
    let csv = format!("{}\n0,0,0,0,0,0,0\n0,0,0.4,0,0,3,2\n", HEADER);
    let mut arm = MockArm::four_axis();
    let mut campaign = replay(quick_config(), &csv, "filtered");
    run(&mut arm, &mut campaign);

    let (header, rows) = read_table(campaign.output_path(), b',');
    assert_eq!(header, vec!["csv_index", "distance_m"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "1");
    let error: f64 = rows[0][1].parse().unwrap();
    assert!((error - 0.1).abs() < 1e-9);
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn height_axis_is_configurable() {
    let csv = format!("{}\n0,0.5,0,0,5,0,0\n", HEADER);
    let mut arm = MockArm::four_axis();
    let config = ReplayConfig {
        height_axis: HeightAxis::Y,
        ..quick_config()
    };
    let mut campaign = replay(config, &csv, "y_up");
    run(&mut arm, &mut campaign);

    assert_eq!(campaign.report_rows(), vec![(0, 0.0)]);
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn sample_count_is_capped() {
    let mut csv = String::from(HEADER);
    for i in 0..12 {
        csv.push_str(&format!("\n0,0,0,{},0,0,0", i));
    }
    let config = ReplayConfig {
        max_samples: 4,
        ..quick_config()
    };
    let mut arm = MockArm::four_axis();
    let mut campaign = replay(config, &csv, "capped");
    run(&mut arm, &mut campaign);

    assert_eq!(campaign.points().len(), 4);
    assert_eq!(campaign.selected().iter().collect::<HashSet<_>>().len(), 4);
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn nearest_selection_follows_targets() {
    let csv = format!("{}\n0,0,0,0,0,0,0\n1,0,0,10,0,0,0\n0,1,0,0,10,0,0\n", HEADER);
    let config = ReplayConfig {
        selection: SampleSelection::Nearest {
            targets: vec![[0.0, 0.9, 0.0], [0.8, 0.1, 0.0]],
        },
        ..quick_config()
    };
    let mut arm = MockArm::four_axis();
    let mut campaign = replay(config, &csv, "nearest");
    run(&mut arm, &mut campaign);

    assert_eq!(campaign.selected(), &[2, 1]);
    assert_eq!(
        campaign.points().iter().map(|p| p.row_index).collect::<Vec<_>>(),
        vec![2, 1]
    );
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn missing_column_refuses_to_build_campaign() {
    let path = temp_csv("missing_j3");
    std::fs::write(&path, "x_rel,y_rel,z_rel,j1,j2,j4\n0,0,0,0,0,0\n").unwrap();
    let result = ReplayCampaign::from_path(quick_config(), &path, StdRng::seed_from_u64(0), temp_csv("unused"));
    assert!(matches!(
        result,
        Err(CampaignError::Dataset(DatasetError::MissingColumn { .. }))
    ));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn empty_dataset_writes_empty_report() {
    let mut arm = MockArm::four_axis();
    let mut campaign = replay(quick_config(), HEADER, "empty_dataset");
    assert_eq!(run(&mut arm, &mut campaign), RunOutcome::Completed);
    assert_eq!(campaign.stats().unwrap().count, 0);
    let content = std::fs::read_to_string(campaign.output_path()).unwrap();
    assert_eq!(content, "csv_index,distance_m\n");
    let _ = std::fs::remove_file(campaign.output_path());
}

#[test]
fn failed_report_export_keeps_results() {
    let csv = format!("{}\n0,0,0.5,0,0,5,0\n", HEADER);
    let dataset = TrajectoryDataset::parse_str(&csv).unwrap();
    let bad = std::env::temp_dir().join("arm_sampler_no_report_dir").join("r.csv");
    let mut campaign = ReplayCampaign::new(quick_config(), dataset, StdRng::seed_from_u64(1), bad).unwrap();
    let mut arm = MockArm::four_axis();

    let result = SimulationDriver::new(DriverConfig::default())
        .unwrap()
        .run(&mut arm, &mut campaign);
    assert!(matches!(result, Err(CampaignError::Export(_))));
    assert_eq!(campaign.points().len(), 1);

    let retry = temp_csv("report_retry");
    assert_eq!(campaign.export_report(&retry).unwrap(), 1);
    let _ = std::fs::remove_file(&retry);
}

#[test]
fn cancelled_mid_blend_leaves_last_target() {
    let csv = format!("{}\n1,0,0,10,0,0,0\n", HEADER);
    let config = ReplayConfig {
        blend_duration: 1.0,
        ..quick_config()
    };
    let mut campaign = replay(config, &csv, "cancel_blend");
    let mut arm = MockArm::four_axis();
    let mut driver = SimulationDriver::new(DriverConfig {
        tick_seconds: 0.01,
        max_sim_seconds: Some(0.5),
    })
    .unwrap();

    assert_eq!(driver.run(&mut arm, &mut campaign).unwrap(), RunOutcome::TimedOut);
    assert_eq!(campaign.state(), ReplayState::Cancelled);
    assert!(campaign.points().is_empty());
    // halfway through a smoothstep blend from 0 to 10
    let j1 = arm.targets[1];
    assert!(j1 > 0.0 && j1 < 10.0, "j1 target {}", j1);
    assert_eq!(arm.positions[1], j1);
    assert!(!campaign.output_path().exists());
}
