use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input, spanned::Spanned};

use crate::utils;

/// A field that takes a value on the command line.
struct ValueOption {
    ident: syn::Ident,
    long: String,
    parse: proc_macro2::TokenStream,
    hint: String,
    help: String,
}

fn value_option(field: &syn::Field) -> syn::Result<Option<ValueOption>> {
    let Some(ident) = &field.ident else {
        return Ok(None);
    };
    let args = utils::parse_attr_args(
        &field.attrs,
        "cli",
        &["long", "parse_with", "help", "value"],
        &[],
    )?;
    let Some(long) = args.get("long") else {
        return Ok(None);
    };

    let parse_with: Option<syn::Path> = args.get("parse_with").map(syn::parse_str).transpose()?;
    let hint = args
        .get("value")
        .map(str::to_owned)
        .unwrap_or_else(|| utils::value_hint(&field.ty, parse_with.is_some()));

    Ok(Some(ValueOption {
        ident: ident.clone(),
        long: long.to_owned(),
        parse: utils::build_cli_parse_expr(&field.ty, parse_with.as_ref()),
        hint,
        help: args.get("help").unwrap_or_default().to_owned(),
    }))
}

pub fn derive_cli_options_inner(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let struct_ident = &input.ident;

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new(input.span(), "CliOptions can only be derived for structs")
            .to_compile_error()
            .into();
    };
    let Fields::Named(fields) = &data_struct.fields else {
        return syn::Error::new(input.span(), "CliOptions requires named fields")
            .to_compile_error()
            .into();
    };

    let options: Vec<ValueOption> = match fields
        .named
        .iter()
        .filter_map(|field| value_option(field).transpose())
        .collect()
    {
        Ok(options) => options,
        Err(err) => return err.to_compile_error().into(),
    };

    let lit = |s: &str| LitStr::new(s, Span::call_site());
    let arms = options.iter().map(|opt| {
        let ValueOption { ident, parse, .. } = opt;
        let long = lit(&opt.long);
        quote! {
            #long => {
                let raw = value.ok_or_else(|| {
                    crate::Error::invalid_input(format!("Missing value for --{name}"))
                })?;
                self.#ident = #parse;
                Ok(true)
            }
        }
    });
    let help_rows = options.iter().map(|opt| {
        let (long, hint, help) = (lit(&opt.long), lit(&opt.hint), lit(&opt.help));
        quote! { (#long, #hint, #help) }
    });

    let expanded = quote! {
        impl #struct_ident {
            /// Splits `name=value`, or takes the next argument as the value
            /// unless it is another option.
            fn split_arg(
                raw_name: &str,
                args: &mut std::iter::Peekable<impl Iterator<Item = String>>,
            ) -> (String, Option<String>) {
                if let Some((name, value)) = raw_name.split_once('=') {
                    return (name.to_string(), Some(value.to_string()));
                }
                let value = args.next_if(|next| !next.starts_with("--"));
                (raw_name.to_string(), value)
            }

            /// Applies a value-taking option. `Ok(false)` means `name` is not
            /// one of them.
            fn apply_cli_option(
                &mut self,
                name: &str,
                value: Option<String>,
            ) -> crate::Result<bool> {
                match name {
                    #(#arms,)*
                    _ => Ok(false),
                }
            }

            /// `(long name, value hint, help)` for every value-taking option.
            pub fn cli_option_help() -> &'static [(&'static str, &'static str, &'static str)] {
                &[#(#help_rows),*]
            }
        }
    };

    TokenStream::from(expanded)
}
