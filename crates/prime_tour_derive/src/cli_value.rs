use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input, spanned::Spanned};

use crate::utils;

struct Spelling {
    ident: syn::Ident,
    canonical: String,
    aliases: Vec<String>,
}

fn spellings(data: &syn::DataEnum) -> syn::Result<Vec<Spelling>> {
    data.variants
        .iter()
        .map(|variant| {
            if !matches!(variant.fields, Fields::Unit) {
                return Err(syn::Error::new(
                    variant.span(),
                    "CliValue only supports enums with unit variants",
                ));
            }
            let args = utils::parse_attr_args(&variant.attrs, "cli", &["name", "alias"], &[])?;
            Ok(Spelling {
                ident: variant.ident.clone(),
                canonical: args
                    .get("name")
                    .map(str::to_owned)
                    .unwrap_or_else(|| utils::to_kebab_case(&variant.ident.to_string())),
                aliases: args.all("alias").map(str::to_owned).collect(),
            })
        })
        .collect()
}

pub fn derive_cli_value_inner(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let enum_ident = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new(input.span(), "CliValue can only be derived for enums")
            .to_compile_error()
            .into();
    };

    let parsed = utils::parse_attr_args(&input.attrs, "cli_value", &["option"], &[])
        .and_then(|args| Ok((args, spellings(data_enum)?)));
    let (args, spellings) = match parsed {
        Ok(parsed) => parsed,
        Err(err) => return err.to_compile_error().into(),
    };
    let option_name = args
        .get("option")
        .map(str::to_owned)
        .unwrap_or_else(|| utils::to_kebab_case(&enum_ident.to_string()));
    let option_lit = LitStr::new(&option_name, Span::call_site());

    let lit = |s: &str| LitStr::new(s, Span::call_site());
    let canonical: Vec<LitStr> = spellings.iter().map(|s| lit(&s.canonical)).collect();
    let idents: Vec<&syn::Ident> = spellings.iter().map(|s| &s.ident).collect();
    let accepted = spellings.iter().map(|s| {
        let names = std::iter::once(&s.canonical)
            .chain(&s.aliases)
            .map(|name| lit(name));
        quote! { #(#names)|* }
    });

    let expanded = quote! {
        impl #enum_ident {
            /// Canonical spellings accepted on the command line.
            pub const VARIANTS: &'static [&'static str] = &[#(#canonical),*];

            pub fn parse(raw: &str) -> crate::Result<Self> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    #(#accepted => Ok(Self::#idents),)*
                    _ => Err(crate::Error::invalid_input(format!(
                        "Invalid value for --{}: {} (expected {})",
                        #option_lit,
                        raw,
                        Self::VARIANTS.join("|")
                    ))),
                }
            }
        }

        impl std::str::FromStr for #enum_ident {
            type Err = crate::Error;

            fn from_str(raw: &str) -> crate::Result<Self> {
                Self::parse(raw)
            }
        }

        impl std::fmt::Display for #enum_ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    #(Self::#idents => #canonical,)*
                })
            }
        }
    };

    TokenStream::from(expanded)
}
