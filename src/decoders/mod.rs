//! Stream decoders.
//!
//! Only the filters that show up in form templates' structural streams
//! (object streams and cross-reference streams) are supported: FlateDecode,
//! optionally with PNG or TIFF predictors. Page content is never decoded;
//! it is carried through untouched.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// A single PDF stream filter.
pub trait StreamDecoder {
    /// Decode the input bytes.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// The filter name as it appears in `/Filter`.
    fn name(&self) -> &str;
}

/// Decode stream data using the `/Filter` and `/DecodeParms` of its dictionary.
pub fn decode_stream(dict: &Dict, data: &[u8]) -> Result<Vec<u8>> {
    let filters = filter_names(dict.get("Filter"))?;
    let params = dict.get("DecodeParms").or_else(|| dict.get("DP"));

    let mut current = data.to_vec();
    for (index, filter) in filters.iter().enumerate() {
        let decoder: Box<dyn StreamDecoder> = match filter.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            other => return Err(Error::Unsupported(format!("stream filter /{}", other))),
        };
        current = decoder.decode(&current)?;

        let filter_params = match params {
            Some(Object::Array(items)) => items.get(index),
            other => other,
        };
        if let Some(decode_params) = filter_params.and_then(Object::as_dict) {
            let decode_params = DecodeParams::from_dict(decode_params);
            if decode_params.predictor > 1 {
                log::debug!("Applying predictor {} after /{}", decode_params.predictor, decoder.name());
                current = decode_predictor(&current, &decode_params)?;
            }
        }
    }
    Ok(current)
}

fn filter_names(filter: Option<&Object>) -> Result<Vec<String>> {
    match filter {
        None => Ok(Vec::new()),
        Some(Object::Name(name)) => Ok(vec![name.clone()]),
        Some(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_name().map(str::to_string).ok_or_else(|| Error::InvalidObjectType {
                    expected: "Name".to_string(),
                    found: item.type_name().to_string(),
                })
            })
            .collect(),
        Some(other) => Err(Error::InvalidObjectType {
            expected: "Name or Array".to_string(),
            found: other.type_name().to_string(),
        }),
    }
}
