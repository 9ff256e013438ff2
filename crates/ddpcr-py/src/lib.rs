use ddpcr_core::config::{AssayConfig, SimConfig};
use ddpcr_core::population::{simulate_assay, simulate_population};
use ddpcr_core::rng::create_rng;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Minimal PyO3 module exposing ddpcr-core to Python.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pyfunction]
fn default_config_json() -> PyResult<String> {
    serde_json::to_string(&SimConfig::default())
        .map_err(|e| PyValueError::new_err(format!("failed to serialize default config: {e}")))
}

#[pyfunction]
fn validate_config_json(config_json: &str) -> PyResult<bool> {
    let config = parse_sim_config(config_json)?;
    config
        .validate()
        .map(|_| true)
        .map_err(|e| PyValueError::new_err(format!("invalid simulation configuration: {e}")))
}

/// Run one population and return its summary plus requested/placed counts as JSON.
#[pyfunction]
fn simulate_summary_json(config_json: &str) -> PyResult<String> {
    let config = parse_sim_config(config_json)?;
    config
        .validate()
        .map_err(|e| PyValueError::new_err(format!("invalid simulation configuration: {e}")))?;
    let run = simulate_population(&config, &mut create_rng(config.seed))
        .map_err(|e| PyValueError::new_err(format!("simulation failed: {e}")))?;
    let summary = run
        .summarize(&config)
        .map_err(|e| PyValueError::new_err(format!("statistics failed: {e}")))?;
    let payload = serde_json::json!({
        "requested_count": run.requested_count,
        "placed_count": run.placed_count,
        "summary": summary,
    });
    Ok(payload.to_string())
}

#[pyfunction]
fn assay_summary_json(config_json: &str) -> PyResult<String> {
    let config: AssayConfig = serde_json::from_str(config_json)
        .map_err(|e| PyValueError::new_err(format!("invalid assay config json: {e}")))?;
    config
        .validate()
        .map_err(|e| PyValueError::new_err(format!("invalid assay configuration: {e}")))?;
    let run = simulate_assay(&config, &mut create_rng(config.seed))
        .map_err(|e| PyValueError::new_err(format!("simulation failed: {e}")))?;
    let summary = run
        .summarize(&config)
        .map_err(|e| PyValueError::new_err(format!("statistics failed: {e}")))?;
    serde_json::to_string(&summary)
        .map_err(|e| PyValueError::new_err(format!("failed to serialize summary: {e}")))
}

fn parse_sim_config(config_json: &str) -> PyResult<SimConfig> {
    serde_json::from_str(config_json)
        .map_err(|e| PyValueError::new_err(format!("invalid config json: {e}")))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(validate_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(simulate_summary_json, m)?)?;
    m.add_function(wrap_pyfunction!(assay_summary_json, m)?)?;
    Ok(())
}
