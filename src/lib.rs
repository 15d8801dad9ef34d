use pyo3::prelude::*;
use pyo3::wrap_pyfunction;

pub mod analysis;
pub mod convaq_structs;
pub mod error;
pub mod fisher;
pub mod merge;
pub mod permutation;
pub mod python_bindings;
pub mod query;
pub mod regions;
pub mod sorts;
pub mod statistical;

/// The Python module definition
#[pymodule]
fn convaq(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    m.add_function(wrap_pyfunction!(python_bindings::convaq_analysis, m)?)?;
    m.add_function(wrap_pyfunction!(python_bindings::convaq_analysis_detailed, m)?)?;
    Ok(())
}
