use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr, ReturnType, Type, parse_macro_input, spanned::Spanned};

pub fn timer_inner(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let label = if attr.is_empty() {
        func.sig.ident.to_string()
    } else {
        parse_macro_input!(attr as LitStr).value()
    };

    if func.sig.asyncness.is_some() {
        return syn::Error::new(func.sig.span(), "timer does not support async functions")
            .to_compile_error()
            .into();
    }

    let output = match &func.sig.output {
        ReturnType::Default => quote! { () },
        ReturnType::Type(_, ty) => {
            if matches!(ty.as_ref(), Type::ImplTrait(_)) {
                return syn::Error::new(ty.span(), "timer does not support `impl Trait` returns")
                    .to_compile_error()
                    .into();
            }
            quote! { #ty }
        }
    };

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;
    let label_lit = LitStr::new(&label, proc_macro2::Span::call_site());

    let expanded = quote! {
        #(#attrs)*
        #vis #sig {
            let __timer_start = ::std::time::Instant::now();
            #[allow(clippy::redundant_closure_call)]
            let __timer_result = (|| -> #output #block)();
            ::log::info!(
                "{}: elapsed_s={:.3}",
                #label_lit,
                __timer_start.elapsed().as_secs_f64()
            );
            __timer_result
        }
    };

    TokenStream::from(expanded)
}
