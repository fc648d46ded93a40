use quote::quote;
use syn::{Attribute, LitStr, Path, Type, TypePath};

/// `key = "value"` pairs and bare flags gathered from every `#[name(...)]`
/// attribute on an item.
#[derive(Default)]
pub struct AttrArgs {
    values: Vec<(String, String)>,
    flags: Vec<String>,
}

impl AttrArgs {
    /// Last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

pub fn parse_attr_args(
    attrs: &[Attribute],
    name: &str,
    keys: &[&str],
    flags: &[&str],
) -> syn::Result<AttrArgs> {
    let mut args = AttrArgs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident(name)) {
        attr.parse_nested_meta(|meta| {
            let key = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            if flags.contains(&key.as_str()) {
                args.flags.push(key);
                return Ok(());
            }
            if keys.contains(&key.as_str()) {
                let lit: LitStr = meta.value()?.parse()?;
                args.values.push((key, lit.value()));
                return Ok(());
            }
            let expected: Vec<&str> = keys.iter().chain(flags).copied().collect();
            Err(meta.error(format!(
                "unsupported {name} attribute; expected one of: {}",
                expected.join(", ")
            )))
        })?;
    }
    Ok(args)
}

pub fn build_cli_parse_expr(ty: &Type, parse_with: Option<&Path>) -> proc_macro2::TokenStream {
    if let Some(parse_with) = parse_with {
        quote! { #parse_with(&raw)? }
    } else {
        quote! {
            raw.trim().parse::<#ty>()
                .map_err(|e| crate::Error::invalid_input(format!(
                    "Invalid value for --{name}: {raw} ({e})"
                )))?
        }
    }
}

/// Usage placeholder for an option, e.g. `<usize>` or `<path>`.
pub fn value_hint(ty: &Type, custom_parser: bool) -> String {
    if custom_parser {
        return "<value>".to_string();
    }
    match last_segment(ty).as_deref() {
        Some("String") | Some("PathBuf") => "<path>".to_string(),
        Some(name) => format!("<{name}>"),
        None => "<value>".to_string(),
    }
}

fn last_segment(ty: &Type) -> Option<String> {
    if let Type::Path(TypePath { path, .. }) = ty
        && let Some(seg) = path.segments.last()
    {
        return Some(seg.ident.to_string());
    }
    None
}

pub fn to_kebab_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (idx, ch) in s.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx != 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
