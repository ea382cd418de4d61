use crate::utils::{apply_derives, ensure_fields};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::Parser;
use syn::spanned::Spanned;
use syn::{Fields, ItemStruct, Type};

/// #[aggregate] 宏实现
/// - 前置字段：`id: String`, `tenant_id: String`, `version: usize`（已存在则复用并前移）
/// - 追加字段：`#[serde(skip)] changes: Vec<Event>`（未提交事件，不参与快照序列化）
/// - 合并派生：Debug, Clone, Default, Serialize, Deserialize
/// - 实现 `::es_domain::entity::Entity` 与 `::es_domain::aggregate::EventSourced`
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    match expand_struct(attr.into(), item.into()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_struct(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let mut st: ItemStruct = syn::parse2(item)
        .map_err(|e| syn::Error::new(e.span(), "#[aggregate] only on struct"))?;

    let event_ty = parse_event_type(attr)?.ok_or_else(|| {
        syn::Error::new(
            st.ident.span(),
            "missing event type, expected #[aggregate(event = EventType)]",
        )
    })?;

    let Fields::Named(fields) = &mut st.fields else {
        return Err(syn::Error::new(
            st.span(),
            "only supports named-field struct",
        ));
    };

    ensure_fields(
        fields,
        vec![
            syn::parse_quote! { id: String },
            syn::parse_quote! { tenant_id: String },
            syn::parse_quote! { version: usize },
        ],
        vec![syn::parse_quote! {
            #[serde(skip)]
            changes: ::std::vec::Vec<#event_ty>
        }],
    );

    apply_derives(
        &mut st.attrs,
        vec![
            syn::parse_quote!(Debug),
            syn::parse_quote!(Clone),
            syn::parse_quote!(Default),
            syn::parse_quote!(serde::Serialize),
            syn::parse_quote!(serde::Deserialize),
        ],
    );

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();

    Ok(quote! {
        #st

        impl #impl_generics ::es_domain::entity::Entity for #ident #ty_generics #where_clause {
            fn new(id: String, tenant_id: String) -> Self {
                Self {
                    id,
                    tenant_id,
                    version: 0,
                    ..::std::default::Default::default()
                }
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn tenant_id(&self) -> &str {
                &self.tenant_id
            }

            fn version(&self) -> usize {
                self.version
            }
        }

        impl #impl_generics ::es_domain::aggregate::EventSourced for #ident #ty_generics #where_clause {
            type Event = #event_ty;

            fn changes(&self) -> &[Self::Event] {
                &self.changes
            }

            fn clear_changes(&mut self) {
                self.changes.clear();
            }

            fn record_change(&mut self, event: Self::Event) {
                self.changes.push(event);
            }

            fn set_version(&mut self, version: usize) {
                self.version = version;
            }
        }
    })
}

// 解析 `event = <Type>`
fn parse_event_type(attr: TokenStream2) -> syn::Result<Option<Type>> {
    let mut event_ty: Option<Type> = None;

    let parser = syn::meta::parser(|meta| {
        if !meta.path.is_ident("event") {
            return Err(meta.error("unknown key in attribute; expected 'event'"));
        }
        if event_ty.is_some() {
            return Err(meta.error("duplicate key 'event' in attribute"));
        }
        event_ty = Some(meta.value()?.parse()?);
        Ok(())
    });
    parser.parse2(attr)?;

    Ok(event_ty)
}
