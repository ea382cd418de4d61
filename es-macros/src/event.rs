use crate::utils::apply_derives;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use std::collections::HashMap;
use syn::spanned::Spanned;
use syn::{Fields, Ident, ItemEnum, LitStr, Variant};

/// #[event] 宏实现
/// - 合并派生：Debug, Clone, PartialEq, Serialize, Deserialize
/// - 生成 `::es_domain::domain_event::DomainEvent` 实现（事件类型标签与标签到变体的映射）
/// - 变体可覆写标签：`#[event(event_type = "...")]`，默认 `EnumName.Variant`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    let item = TokenStream2::from(item);
    match expand_enum(attr, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_enum(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    if !attr.is_empty() {
        return Err(syn::Error::new(
            attr.span(),
            "#[event] takes no arguments on the enum",
        ));
    }

    let mut enum_item: ItemEnum = syn::parse2(item)
        .map_err(|e| syn::Error::new(e.span(), "#[event] can only be used on enum types"))?;

    if enum_item.variants.is_empty() {
        return Err(syn::Error::new(
            enum_item.ident.span(),
            "#[event] requires at least one variant",
        ));
    }

    apply_derives(
        &mut enum_item.attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(PartialEq),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let enum_name = enum_item.ident.to_string();
    let mut tags: Vec<(Ident, LitStr)> = Vec::with_capacity(enum_item.variants.len());
    let mut owners: HashMap<String, Ident> = HashMap::new();

    for variant in enum_item.variants.iter_mut() {
        if !matches!(variant.fields, Fields::Named(_)) {
            return Err(syn::Error::new(
                variant.ident.span(),
                "#[event] supports only named-field enum variants, e.g., Variant { x: T }",
            ));
        }

        let tag = take_event_type(variant)?.unwrap_or_else(|| {
            LitStr::new(
                &format!("{enum_name}.{}", variant.ident),
                variant.ident.span(),
            )
        });

        if let Some(owner) = owners.insert(tag.value(), variant.ident.clone()) {
            return Err(syn::Error::new(
                tag.span(),
                format!(
                    "event type '{}' is already used by variant '{owner}'",
                    tag.value()
                ),
            ));
        }
        tags.push((variant.ident.clone(), tag));
    }

    let ident = &enum_item.ident;
    let (impl_generics, ty_generics, where_clause) = enum_item.generics.split_for_impl();

    let all = tags.iter().map(|(_, tag)| tag);
    let by_variant = tags
        .iter()
        .map(|(variant, tag)| quote! { Self::#variant { .. } => #tag });
    let by_tag = tags.iter().map(|(variant, tag)| {
        let name = variant.to_string();
        quote! { #tag => ::std::option::Option::Some(#name) }
    });

    Ok(quote! {
        #enum_item

        impl #impl_generics ::es_domain::domain_event::DomainEvent for #ident #ty_generics #where_clause {
            const EVENT_TYPES: &'static [&'static str] = &[ #( #all ),* ];

            fn event_type(&self) -> &'static str {
                match self { #( #by_variant, )* }
            }

            fn variant_of(event_type: &str) -> ::std::option::Option<&'static str> {
                match event_type {
                    #( #by_tag, )*
                    _ => ::std::option::Option::None,
                }
            }
        }
    })
}

/// 取出并移除变体上的 `#[event(event_type = "...")]`，其余属性原样保留
fn take_event_type(variant: &mut Variant) -> syn::Result<Option<LitStr>> {
    let mut tag: Option<LitStr> = None;
    let mut kept = Vec::with_capacity(variant.attrs.len());

    for attr in variant.attrs.drain(..) {
        if !attr.path().is_ident("event") {
            kept.push(attr);
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if !meta.path.is_ident("event_type") {
                return Err(meta.error("unknown key; expected 'event_type'"));
            }
            if tag.is_some() {
                return Err(meta.error("duplicate 'event_type' specified for this variant"));
            }
            tag = Some(meta.value()?.parse::<LitStr>()?);
            Ok(())
        })?;
    }

    variant.attrs = kept;
    Ok(tag)
}
