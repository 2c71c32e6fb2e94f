//! Row window selection from request parameters.

use queryget_proto::{Value, Window};

use super::params::Params;
use crate::config::PlanConfig;
use crate::error::Result;

/// Requested window, before sizes are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// One-based page number.
    Page { page: i64, size: Option<u64> },
    /// Direct row offset.
    Offset { skip: u64, size: Option<u64> },
}

impl PageRequest {
    /// Read the window from request parameters.
    ///
    /// A page number wins over a row offset. Without either, the first page
    /// is requested. Unparsable numbers read as absent.
    pub fn from_params(params: &Params, config: &PlanConfig) -> Self {
        let keys = &config.keys;
        let size = params
            .first_of(&keys.page_size)
            .and_then(integer)
            .map(|s| s.max(0) as u64);

        if let Some(page) = params.first_of(&keys.page) {
            // an unparsable page still asks for a page; it clamps to the first
            return PageRequest::Page {
                page: integer(page).unwrap_or(1),
                size,
            };
        }
        match params.first_of(&keys.skip).and_then(integer) {
            Some(skip) => PageRequest::Offset {
                skip: skip.max(0) as u64,
                size,
            },
            None => PageRequest::Page { page: 1, size },
        }
    }

    /// Resolve the window, clamping the size to the configured bounds.
    pub fn window(&self, config: &PlanConfig) -> Result<Window> {
        Ok(match *self {
            PageRequest::Page { page, size } => {
                Window::from_page(page, config.clamp_page_size(size))?
            }
            PageRequest::Offset { skip, size } => Window::new(skip, config.clamp_page_size(size)),
        })
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) => Some(f.trunc() as i64),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}
