use proc_macro2::TokenStream;
use quote::quote;

use crate::utils::StructItem;

pub fn generate_binary_encode_impl(strct: StructItem) -> syn::Result<TokenStream> {
    let mut byte_len_body = quote! {};
    let mut encode_body = quote! {};

    for field in &strct.fields {
        if field.ignore {
            continue;
        }
        let ident = &field.ident;
        byte_len_body.extend(quote! {
            size += crate::encoding::BinaryEncodable::byte_len(&self.#ident);
        });
        encode_body.extend(quote! {
            size += crate::encoding::BinaryEncodable::encode(&self.#ident, stream)?;
        });
    }

    let ident = strct.ident;
    Ok(quote! {
        impl crate::encoding::BinaryEncodable for #ident {
            #[allow(unused_mut)]
            fn byte_len(&self) -> usize {
                let mut size = 0usize;
                #byte_len_body
                size
            }

            #[allow(unused_mut)]
            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
            ) -> crate::encoding::EncodingResult<usize> {
                let mut size = 0usize;
                #encode_body
                Ok(size)
            }
        }
    })
}

pub fn generate_binary_decode_impl(strct: StructItem) -> syn::Result<TokenStream> {
    let mut decode_build = quote! {};

    for field in &strct.fields {
        let ident = &field.ident;
        if field.ignore {
            decode_build.extend(quote! {
                #ident: ::std::default::Default::default(),
            });
            continue;
        }
        decode_build.extend(quote! {
            #ident: crate::encoding::BinaryDecodable::decode(stream, decoding_options)?,
        });
    }

    let ident = strct.ident;
    Ok(quote! {
        impl crate::encoding::BinaryDecodable for #ident {
            #[allow(unused_variables)]
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                decoding_options: &crate::encoding::DecodingOptions,
            ) -> crate::encoding::EncodingResult<Self> {
                Ok(Self {
                    #decode_build
                })
            }
        }
    })
}
