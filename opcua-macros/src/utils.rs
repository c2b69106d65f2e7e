use syn::{DeriveInput, Field, Ident, Type};

/// A single named field of a derive input struct, with any `#[opcua(...)]`
/// attribute parsed off it.
pub struct StructField {
    pub ident: Ident,
    #[allow(dead_code)]
    pub typ: Type,
    pub ignore: bool,
}

impl StructField {
    fn from_field(field: Field) -> syn::Result<Self> {
        let Some(ident) = field.ident else {
            return Err(syn::Error::new_spanned(
                field,
                "derive macro input must have named fields",
            ));
        };
        let mut ignore = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("opcua") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("ignore") {
                    ignore = true;
                    Ok(())
                } else {
                    Err(meta.error("unrecognized opcua field attribute"))
                }
            })?;
        }
        Ok(StructField {
            ident,
            typ: field.ty,
            ignore,
        })
    }
}

/// A struct's name plus its encodable fields, parsed from a derive input.
pub struct StructItem {
    pub ident: Ident,
    pub fields: Vec<StructField>,
}

impl StructItem {
    pub fn from_input(input: DeriveInput) -> syn::Result<Self> {
        let syn::Data::Struct(strct) = input.data else {
            return Err(syn::Error::new_spanned(
                input.ident,
                "derive macro input must be a struct",
            ));
        };
        let fields = strct
            .fields
            .into_iter()
            .map(StructField::from_field)
            .collect::<syn::Result<Vec<_>>>()?;
        Ok(StructItem {
            ident: input.ident,
            fields,
        })
    }
}
