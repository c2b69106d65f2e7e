#![warn(missing_docs)]

//! Proc macros deriving the binary codec traits for `opcua-types`'s
//! structured service types.

mod encoding;
mod utils;

use encoding::{generate_encoding_impl, EncodingTarget};
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

#[proc_macro_derive(BinaryEncodable, attributes(opcua))]
/// Derive `BinaryEncodable` for a struct by encoding each field in
/// declaration order. Mark a field `#[opcua(ignore)]` to omit it from the
/// wire representation (it is reconstructed with `Default` on decode).
pub fn derive_binary_encodable(item: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(item);
    match generate_encoding_impl(input, EncodingTarget::BinaryEncode) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[proc_macro_derive(BinaryDecodable, attributes(opcua))]
/// Derive `BinaryDecodable` for a struct by decoding each field in
/// declaration order.
pub fn derive_binary_decodable(item: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(item);
    match generate_encoding_impl(input, EncodingTarget::BinaryDecode) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}
