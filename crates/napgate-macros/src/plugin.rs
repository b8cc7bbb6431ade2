use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::parse::Parser;
use syn::{FnArg, Ident, ItemFn, LitStr, Pat, Type};

// ─── Arguments ────────────────────────────────────────────────────────────────

/// Parsed `#[plugin(...)]` arguments.
#[derive(Default)]
struct PluginArgs {
    name: Option<LitStr>,
}

impl PluginArgs {
    fn parse(attr: TokenStream) -> syn::Result<Self> {
        let mut args = Self::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("name") {
                args.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported `#[plugin]` argument; expected `name = \"...\"`"))
            }
        });
        parser.parse2(attr)?;
        Ok(args)
    }
}

// ─── Signature checks ────────────────────────────────────────────────────────

/// `true` when the first parameter is `serde_json::Value` (or any path ending in `Value`).
fn wants_raw_payload(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Value"),
        Type::Group(group) => wants_raw_payload(&group.elem),
        Type::Paren(paren) => wants_raw_payload(&paren.elem),
        _ => false,
    }
}

fn check_signature(func: &ItemFn) -> syn::Result<&Type> {
    let sig = &func.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "`#[plugin]` handlers must be `async fn`",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "`#[plugin]` handlers cannot be generic",
        ));
    }
    if sig.inputs.len() != 2 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "`#[plugin]` handlers take exactly two parameters: the event and the client",
        ));
    }

    if let Some(FnArg::Receiver(receiver)) = sig.inputs.iter().find(|arg| matches!(arg, FnArg::Receiver(_))) {
        return Err(syn::Error::new_spanned(
            receiver,
            "`#[plugin]` cannot be applied to methods",
        ));
    }
    let Some(FnArg::Typed(first)) = sig.inputs.first() else {
        return Err(syn::Error::new_spanned(&sig.inputs, "missing event parameter"));
    };
    if let Pat::Ident(ident) = first.pat.as_ref()
        && ident.by_ref.is_some()
    {
        return Err(syn::Error::new_spanned(
            ident,
            "the event parameter must be taken by value",
        ));
    }

    Ok(first.ty.as_ref())
}

// ─── Expansion ───────────────────────────────────────────────────────────────

/// Implementation of `#[plugin]` / `#[plugin(name = "...")]`.
///
/// Leaves the decorated `async fn` unchanged and appends a
/// `#[distributed_slice]` static that adds it to `PLUGIN_REGISTRY`.
pub fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args = PluginArgs::parse(attr)?;
    let func: ItemFn = syn::parse2(item)?;
    let event_ty = check_signature(&func)?;

    let fn_name = &func.sig.ident;
    let name = match &args.name {
        Some(lit) if lit.value().trim().is_empty() => {
            return Err(syn::Error::new_spanned(lit, "plugin name cannot be empty"));
        }
        Some(lit) => lit.clone(),
        None => LitStr::new(&fn_name.to_string(), fn_name.span()),
    };

    let static_name = Ident::new(
        &format!("_NAPGATE_PLUGIN_{}", fn_name.to_string().to_uppercase()),
        Span::call_site(),
    );

    let (shape, event_arg) = if wants_raw_payload(event_ty) {
        (
            quote!(::napgate::__private::ParamShape::Raw),
            quote!(::core::clone::Clone::clone(event.raw())),
        )
    } else {
        (quote!(::napgate::__private::ParamShape::Wrapped), quote!(event))
    };

    Ok(quote! {
        #func

        #[::napgate::__private::linkme::distributed_slice(::napgate::__private::PLUGIN_REGISTRY)]
        #[linkme(crate = ::napgate::__private::linkme)]
        static #static_name: ::napgate::__private::PluginEntry = ::napgate::__private::PluginEntry {
            name: #name,
            module: ::core::module_path!(),
            file: ::core::file!(),
            line: ::core::line!(),
            shape: #shape,
            call: |event: ::napgate::__private::Event, client: ::napgate::__private::Client| {
                ::napgate::__private::futures::FutureExt::boxed(async move {
                    ::napgate::__private::IntoHandlerResult::into_handler_result(
                        #fn_name(#event_arg, client).await,
                    )
                })
            },
        };
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(attr: &str, item: &str) -> syn::Result<String> {
        let attr: TokenStream = attr.parse().unwrap();
        let item: TokenStream = item.parse().unwrap();
        expand(attr, item).map(|tokens| tokens.to_string())
    }

    #[test]
    fn test_wrapped_handler() {
        let out = expand_str("", "async fn hello(event: Event, client: Client) {}").unwrap();
        assert!(out.contains("_NAPGATE_PLUGIN_HELLO"));
        assert!(out.contains("ParamShape :: Wrapped"));
        assert!(out.contains("name : \"hello\""));
    }

    #[test]
    fn test_leading_underscore_keeps_static_distinct() {
        let plain = expand_str("", "async fn foo(event: Event, client: Client) {}").unwrap();
        let hidden = expand_str("", "async fn _foo(event: Event, client: Client) {}").unwrap();
        assert!(plain.contains("static _NAPGATE_PLUGIN_FOO :"));
        assert!(hidden.contains("static _NAPGATE_PLUGIN__FOO :"));
        assert!(hidden.contains("name : \"_foo\""));
    }

    #[test]
    fn test_raw_handler() {
        let out = expand_str(
            "name = \"dump\"",
            "async fn raw(event: serde_json::Value, client: Client) {}",
        )
        .unwrap();
        assert!(out.contains("ParamShape :: Raw"));
        assert!(out.contains("name : \"dump\""));
        assert!(out.contains("event . raw ()"));
    }

    #[test]
    fn test_rejects_sync_fn() {
        let err = expand_str("", "fn hello(event: Event, client: Client) {}").unwrap_err();
        assert!(err.to_string().contains("async fn"));
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let err = expand_str("", "async fn hello(event: Event) {}").unwrap_err();
        assert!(err.to_string().contains("exactly two parameters"));
    }

    #[test]
    fn test_rejects_unknown_argument() {
        let err = expand_str("priority = 1", "async fn hello(e: Event, c: Client) {}").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
