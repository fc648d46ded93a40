use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input, spanned::Spanned};

use crate::utils;

/// How one field is rendered after `key = `.
fn value_expr(field: &syn::Field, mode: &str) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &field.ident;
    Ok(match mode {
        "display" => quote! { &self.#ident },
        "len" => quote! { &self.#ident.len() },
        "path" => quote! { &self.#ident.display() },
        // Empty strings read as "-" so unset paths stay visible in logs.
        "or-dash" => quote! {
            &if self.#ident.is_empty() { "-" } else { self.#ident.as_str() }
        },
        other => {
            return Err(syn::Error::new(
                field.span(),
                format!("unsupported kv fmt mode: {other}"),
            ));
        }
    })
}

pub fn derive_kv_display_inner(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let struct_ident = &input.ident;

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new(input.span(), "KvDisplay can only be derived for structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return syn::Error::new(input.span(), "KvDisplay requires named fields")
            .to_compile_error()
            .into();
    };

    let mut rows: Vec<(String, proc_macro2::TokenStream)> = Vec::new();
    for field in &fields.named {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let row = utils::parse_attr_args(&field.attrs, "kv", &["name", "fmt"], &["skip"])
            .and_then(|args| {
                if args.has("skip") {
                    return Ok(None);
                }
                let key = args
                    .get("name")
                    .map(str::to_owned)
                    .unwrap_or_else(|| field_ident.to_string());
                let value = value_expr(field, args.get("fmt").unwrap_or("display"))?;
                Ok(Some((key, value)))
            });
        match row {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(err) => return err.to_compile_error().into(),
        }
    }

    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let template: String = rows
        .iter()
        .map(|(key, _)| format!("\n\t{key:<width$} = {{}}"))
        .collect();
    let template_lit = LitStr::new(&template, Span::call_site());
    let values = rows.iter().map(|(_, value)| value);

    let expanded = quote! {
        impl std::fmt::Display for #struct_ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, #template_lit, #(#values),*)
            }
        }
    };

    TokenStream::from(expanded)
}
