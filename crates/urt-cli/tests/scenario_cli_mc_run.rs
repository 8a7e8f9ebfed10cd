use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn urt() -> Command {
    Command::cargo_bin("urt").expect("urt binary")
}

fn write_csv(path: &Path, rs: &[f64]) {
    let mut s = String::from("trade_id,R\n");
    for (i, r) in rs.iter().enumerate() {
        s.push_str(&format!("{i},{r}\n"));
    }
    std::fs::write(path, s).expect("write csv");
}

#[test]
fn all_winning_sample_passes_and_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    let out = dir.path().join("nested").join("risk_report.json");
    write_csv(&input, &[1.0; 40]);

    urt()
        .args(["mc", "run", "--paths", "200", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("financial_ok=true reason=mc_pass"))
        .stdout(predicate::str::contains("prob_dd_r_ge_budget=0.0000"));

    let raw = std::fs::read_to_string(&out).expect("report written");
    let v: serde_json::Value = serde_json::from_str(&raw).expect("report json");
    assert_eq!(v["n_paths"], 200);
    assert_eq!(v["financial_ok"], true);
    assert_eq!(v["prob_dd_r_ge_budget"], 0.0);
    // No losses in the sample.
    assert!(v["avg_loss_r_mag"].is_null());
}

#[test]
fn insufficient_sample_exits_gate_fail() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    let out = dir.path().join("risk_report.json");
    write_csv(&input, &[1.0, -1.0, 0.5, -0.5, 2.0]);

    urt()
        .args(["mc", "run", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "financial_ok=false reason=insufficient_trades_for_mc_need>=30_have=5",
        ))
        .stdout(predicate::str::contains("n_paths=0"));
    assert!(out.exists());
}

#[test]
fn ndjson_input_with_custom_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("trades.ndjson");
    let out = dir.path().join("risk_report.json");
    let mut s = String::new();
    for _ in 0..35 {
        s.push_str("{\"r_mult\": 0.8}\n");
    }
    std::fs::write(&input, s).expect("write ndjson");

    urt()
        .args(["mc", "run", "--paths", "100", "--r-key", "r_mult", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("n_trades_in_sample=35"));
}

#[test]
fn missing_column_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    std::fs::write(&input, "trade_id,pnl\n1,2.0\n").expect("write csv");

    urt()
        .args(["mc", "run", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(dir.path().join("r.json"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing column 'R'"));
}

#[test]
fn invalid_flag_value_is_refused_not_simulated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("trades.csv");
    let out = dir.path().join("risk_report.json");
    write_csv(&input, &[1.0; 40]);

    urt()
        .args(["mc", "run", "--paths", "0", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .assert()
        .code(2)
        .stdout(predicate::str::contains("reason=invalid_config:"));
}
