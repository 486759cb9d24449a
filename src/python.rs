#![allow(unsafe_op_in_unsafe_fn)]

use crate::{Arcs, ConvertError, Converter, ConverterBuilder, MoveRepeats, SmoothCurves};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyModule;

fn to_py_err(err: ConvertError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

fn parse_smooth_curves(raw: &str) -> PyResult<SmoothCurves> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "current" | "current_point" => Ok(SmoothCurves::ReflectCurrentPoint),
        "reflect" | "previous_control" => Ok(SmoothCurves::ReflectPreviousControl),
        other => Err(PyValueError::new_err(format!(
            "unknown smooth_curves mode '{other}' (expected current|reflect)"
        ))),
    }
}

fn parse_arcs(raw: &str) -> PyResult<Arcs> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "chord" => Ok(Arcs::Chord),
        "cubic" => Ok(Arcs::Cubic),
        other => Err(PyValueError::new_err(format!(
            "unknown arcs mode '{other}' (expected chord|cubic)"
        ))),
    }
}

fn parse_move_repeats(raw: &str) -> PyResult<MoveRepeats> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "move" => Ok(MoveRepeats::Move),
        "line" | "lineto" => Ok(MoveRepeats::LineTo),
        other => Err(PyValueError::new_err(format!(
            "unknown move_repeats mode '{other}' (expected move|line)"
        ))),
    }
}

#[pyclass(name = "SketchConverter")]
struct PyConverter {
    converter: Converter,
}

#[pymethods]
impl PyConverter {
    #[new]
    #[pyo3(signature = (
        scale=crate::DEFAULT_SCALE,
        text_as_sketch_text=true,
        detect_patterns=true,
        smooth_curves="current",
        arcs="chord",
        move_repeats="move",
        max_clones=crate::DEFAULT_MAX_CLONES,
        debug_log=None,
    ))]
    fn new(
        scale: f64,
        text_as_sketch_text: bool,
        detect_patterns: bool,
        smooth_curves: &str,
        arcs: &str,
        move_repeats: &str,
        max_clones: usize,
        debug_log: Option<String>,
    ) -> PyResult<Self> {
        let mut builder: ConverterBuilder = Converter::builder()
            .scale(scale)
            .text_as_sketch_text(text_as_sketch_text)
            .detect_patterns(detect_patterns)
            .smooth_curves(parse_smooth_curves(smooth_curves)?)
            .arcs(parse_arcs(arcs)?)
            .move_repeats(parse_move_repeats(move_repeats)?)
            .max_clones(max_clones);
        if let Some(path) = debug_log {
            builder = builder.debug_log(path);
        }
        Ok(Self {
            converter: builder.build().map_err(to_py_err)?,
        })
    }

    /// Returns `(btm_json, entity_count)`.
    fn convert(&self, py: Python<'_>, markup: &str) -> PyResult<(String, usize)> {
        py.allow_threads(|| -> crate::Result<(String, usize)> {
            let conversion = self.converter.convert(markup)?;
            Ok((conversion.to_btm_json()?, conversion.count()))
        })
        .map_err(to_py_err)
    }

    fn convert_many(&self, py: Python<'_>, markups: Vec<String>) -> PyResult<Vec<(String, usize)>> {
        py.allow_threads(|| {
            self.converter
                .convert_many_parallel(&markups)?
                .into_iter()
                .map(|c| -> crate::Result<(String, usize)> { Ok((c.to_btm_json()?, c.count())) })
                .collect::<crate::Result<Vec<_>>>()
        })
        .map_err(to_py_err)
    }

    fn intermediate(&self, py: Python<'_>, markup: &str) -> PyResult<String> {
        py.allow_threads(|| self.converter.convert_intermediate(markup))
            .map_err(to_py_err)
    }

    fn fingerprint(&self, py: Python<'_>, markup: &str) -> PyResult<String> {
        py.allow_threads(|| self.converter.convert(markup)?.fingerprint_sha256())
            .map_err(to_py_err)
    }
}

#[pyfunction]
#[pyo3(signature = (markup, scale=crate::DEFAULT_SCALE, text_as_sketch_text=true, detect_patterns=true))]
fn convert_svg(
    py: Python<'_>,
    markup: &str,
    scale: f64,
    text_as_sketch_text: bool,
    detect_patterns: bool,
) -> PyResult<(String, usize)> {
    let converter = Converter::builder()
        .scale(scale)
        .text_as_sketch_text(text_as_sketch_text)
        .detect_patterns(detect_patterns)
        .build()
        .map_err(to_py_err)?;
    PyConverter { converter }.convert(py, markup)
}

/// Detected patterns as a JSON array.
#[pyfunction]
fn detect_patterns(markup: &str) -> PyResult<String> {
    let patterns = crate::detect_patterns(&crate::expand(crate::scan(markup)));
    serde_json::to_string(&patterns).map_err(|e| to_py_err(e.into()))
}

#[pymodule]
fn _btmsketch(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyConverter>()?;
    module.add_function(wrap_pyfunction!(convert_svg, module)?)?;
    module.add_function(wrap_pyfunction!(detect_patterns, module)?)?;
    module.add("CONTRACT_ID", crate::contract::CONTRACT_ID)?;
    module.add("CONTRACT_VERSION", crate::contract::CONTRACT_VERSION)?;
    Ok(())
}
