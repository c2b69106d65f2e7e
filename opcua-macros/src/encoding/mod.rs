mod binary;

use proc_macro2::TokenStream;
use syn::DeriveInput;

use crate::utils::StructItem;

pub enum EncodingTarget {
    BinaryEncode,
    BinaryDecode,
}

pub fn generate_encoding_impl(input: DeriveInput, target: EncodingTarget) -> syn::Result<TokenStream> {
    let strct = StructItem::from_input(input)?;
    match target {
        EncodingTarget::BinaryEncode => binary::generate_binary_encode_impl(strct),
        EncodingTarget::BinaryDecode => binary::generate_binary_decode_impl(strct),
    }
}
