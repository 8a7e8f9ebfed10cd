use urt_risk::*;

fn single_value_cfg(horizon: u64) -> McConfig {
    McConfig {
        n_paths: 50,
        horizon_trades: horizon,
        min_trades_required: 1,
        ..McConfig::default()
    }
}

#[test]
fn scenario_constant_loser_path_folds_to_horizon() {
    let r = run(&[-1.0], &single_value_cfg(10));
    assert_eq!(r.n_paths, 50);
    assert_eq!(r.dd_r_mean, Some(10.0));
    assert_eq!(r.dd_r_p50, Some(10.0));
    assert_eq!(r.dd_r_p99, Some(10.0));
    assert_eq!(r.max_ls_mean, Some(10.0));
    assert_eq!(r.max_ls_p50, Some(10.0));
    assert_eq!(r.prob_dd_r_ge_budget, Some(1.0));
}

#[test]
fn scenario_scratch_path_streak_follows_loss_convention() {
    let leq = run(&[0.0], &single_value_cfg(12));
    assert_eq!(leq.dd_r_mean, Some(0.0));
    assert_eq!(leq.max_ls_p50, Some(12.0));

    let lt = run(
        &[0.0],
        &McConfig {
            loss_is_r_leq_zero: false,
            ..single_value_cfg(12)
        },
    );
    assert_eq!(lt.dd_r_mean, Some(0.0));
    assert_eq!(lt.max_ls_p50, Some(0.0));
}

#[test]
fn scenario_engine_fold_matches_accumulator() {
    let mut fold = PathFold::new();
    for _ in 0..8 {
        fold.push(-0.5, true);
    }
    let r = run(&[-0.5], &single_value_cfg(8));
    assert_eq!(r.dd_r_p95, Some(fold.max_drawdown()));
    assert_eq!(r.max_ls_p95, Some(fold.max_losing_streak() as f64));
}
