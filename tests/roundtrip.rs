mod common;

use std::fs;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::tempdir;
use tuneset_tools::ToolError;
use tuneset_tools::config::Config;
use tuneset_tools::extract::OverflowPolicy;
use tuneset_tools::io::jsonl;
use tuneset_tools::io::sheets::{Spreadsheet, SpreadsheetClient, WorkbookClient};
use tuneset_tools::model::{Record, RejectedRow, RunTotals};
use tuneset_tools::pipeline::{self, RunReport};
use tuneset_tools::tokens::DEFAULT_TOKEN_LIMIT;

fn write_fixture_workbook(path: &Path) {
    let mut workbook = Workbook::new();

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").expect("sheet named");
    notes.write_string(0, 0, "not a dataset").expect("cell written");

    let data = workbook.add_worksheet();
    data.set_name("Pairs").expect("sheet named");
    data.write_string(0, 0, "prompt").expect("cell written");
    data.write_string(0, 1, "completion").expect("cell written");
    data.write_string(1, 0, "What is six times seven?").expect("cell written");
    data.write_number(1, 1, 42).expect("cell written");
    data.write_string(2, 0, "Greet the user").expect("cell written");
    data.write_string(3, 0, "Translate to French").expect("cell written");
    data.write_string(3, 1, "Bonjour").expect("cell written");

    workbook.save(path).expect("workbook saved");
}

fn config_for(sheet_url: String, output_dir: &Path) -> Config {
    Config {
        sheet_url,
        credentials_path: None,
        sheet_index: 1,
        output_dir: output_dir.to_path_buf(),
        filename: "dataset.jsonl".into(),
        encoding: "r50k_base".into(),
        cost_per_1k: 0.03,
        token_limit: DEFAULT_TOKEN_LIMIT,
        overflow_policy: OverflowPolicy::Collect,
    }
}

#[test]
fn jsonl_roundtrip_preserves_records_and_order() {
    let records = vec![
        Record::new("Translate to French \n\n###\n\n", " Bonjour. END"),
        Record::new("Quote \"this\" \n\n###\n\n", " Ünïcødé ✓. END"),
        Record::new("Last \n\n###\n\n", " Done. END"),
    ];
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("dataset.jsonl");

    jsonl::write_records(&records, &path).expect("dataset written");
    let restored = jsonl::read_records(&path).expect("dataset read");

    assert_eq!(records, restored);
}

#[test]
fn jsonl_lines_hold_exactly_prompt_and_completion() {
    let records = vec![
        Record::new("A \n\n###\n\n", " B. END"),
        Record::new("C \n\n###\n\n", " D. END"),
    ];
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("dataset.jsonl");
    fs::write(&path, "stale content that must be replaced\n").expect("stale file written");

    jsonl::write_records(&records, &path).expect("dataset written");
    let written = fs::read_to_string(&path).expect("dataset read");

    assert!(written.ends_with('\n'));
    assert!(!written.ends_with("\n\n"));
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        r#"{"prompt":"A \n\n###\n\n","completion":" B. END"}"#
    );
    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).expect("line is JSON");
        let object = value.as_object().expect("line is an object");
        assert_eq!(object.len(), 2);
        assert!(object["prompt"].is_string());
        assert!(object["completion"].is_string());
    }
}

#[test]
fn writing_into_missing_directory_fails_with_serialization_error() {
    let temp_dir = tempdir().expect("temporary directory");
    let path = temp_dir.path().join("absent").join("dataset.jsonl");

    let error = jsonl::write_records(&[], &path).expect_err("write fails");

    assert!(matches!(error, ToolError::SerializationFailed { .. }));
}

#[test]
fn workbook_client_reads_cells_as_strings() {
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join("pairs.xlsx");
    write_fixture_workbook(&xlsx_path);

    let client = WorkbookClient::new();
    let url = format!("file://{}", xlsx_path.display());
    let mut workbook = client.open_by_url(&url).expect("workbook opened");
    let worksheet = workbook.get_worksheet(1).expect("worksheet read");

    assert_eq!(worksheet.title(), "Pairs");
    let values = worksheet.get_all_values();
    assert_eq!(values[0], vec!["prompt", "completion"]);
    assert_eq!(values[1], vec!["What is six times seven?", "42"]);
    assert_eq!(values.len(), 4);
}

#[test]
fn workbook_client_rejects_remote_and_missing_locations() {
    let client = WorkbookClient::new();

    let remote = client.open_by_url("https://docs.google.com/spreadsheets/d/abc");
    assert!(matches!(remote, Err(ToolError::ExtractionFailed(_))));

    let temp_dir = tempdir().expect("temporary directory");
    let missing = temp_dir.path().join("missing.xlsx");
    let missing = client.open_by_url(&missing.display().to_string());
    assert!(matches!(missing, Err(ToolError::ExtractionFailed(_))));
}

#[test]
fn pipeline_writes_dataset_from_workbook() {
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join("pairs.xlsx");
    write_fixture_workbook(&xlsx_path);
    let output_dir = temp_dir.path().join("Output").join("nested");
    let config = config_for(xlsx_path.display().to_string(), &output_dir);
    let extractor = common::extractor(config.token_limit, config.overflow_policy);

    let report = pipeline::build_dataset_with(&WorkbookClient::new(), &extractor, &config)
        .expect("dataset built");

    assert_eq!(report.output, output_dir.join("dataset.jsonl"));
    assert_eq!(report.record_count, 2);
    assert_eq!(report.skipped_empty, 1);
    assert!(report.rejected.is_empty());

    let records = jsonl::read_records(&report.output).expect("dataset read");
    assert_eq!(
        records,
        vec![
            Record::new("What is six times seven? \n\n###\n\n", " 42. END"),
            Record::new("Translate to French \n\n###\n\n", " Bonjour. END"),
        ]
    );
    let expected_words: usize = 8 + 6;
    assert_eq!(report.totals.word_count, expected_words);
}

#[test]
fn build_dataset_uses_configured_encoder() {
    let temp_dir = tempdir().expect("temporary directory");
    let xlsx_path = temp_dir.path().join("pairs.xlsx");
    write_fixture_workbook(&xlsx_path);
    let config = config_for(xlsx_path.display().to_string(), temp_dir.path());

    let report = pipeline::build_dataset(&config).expect("dataset built");

    assert_eq!(report.record_count, 2);
    assert!(report.totals.token_count > 0);
    let expected_cost = report.totals.token_count as f64 * 0.03 / 1000.0;
    assert!((report.totals.estimated_cost - expected_cost).abs() < 1e-9);
}

#[test]
fn remote_sheet_without_service_account_key_is_a_configuration_error() {
    let temp_dir = tempdir().expect("temporary directory");
    let config = config_for(
        "https://docs.google.com/spreadsheets/d/abc123/edit".into(),
        temp_dir.path(),
    );

    let error = pipeline::build_dataset(&config).expect_err("credentials required");

    match error {
        ToolError::InvalidConfig { key, .. } => assert_eq!(key, "GS_CONFIG_PATH"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp_dir.path().join("dataset.jsonl").exists());
}

#[test]
fn report_prints_the_exact_estimated_cost() {
    let report = RunReport {
        output: PathBuf::from("Output/dataset.jsonl"),
        record_count: 1,
        totals: RunTotals {
            accepted: 1,
            word_count: 3,
            token_count: 4,
            estimated_cost: 0.00006103515625,
        },
        rejected: vec![RejectedRow {
            row: 7,
            error: ToolError::TokenLimitExceeded {
                tokens: 9,
                limit: 8,
            },
        }],
        skipped_empty: 2,
    };

    let summary = report.to_string();

    assert!(summary.contains("Estimated cost of fine-tuning: $0.00006103515625\n"));
    assert!(summary.contains("Estimated tokens: 4\n"));
    assert!(summary.contains("Rows written: 1, skipped (empty): 2, rejected: 1\n"));
    assert!(summary.contains("  row 7: "));
    assert!(summary.ends_with("Dataset: Output/dataset.jsonl\n"));
}
