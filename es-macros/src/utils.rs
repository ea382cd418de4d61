use quote::ToTokens;
use syn::{Attribute, Field, FieldsNamed, Token, punctuated::Punctuated};

// 拆分出非 derive 属性与已有 derive 列表
fn split_derives(attrs: &[Attribute]) -> (Vec<Attribute>, Vec<syn::Path>) {
    let mut retained = Vec::new();
    let mut existing = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("derive") {
            if let Ok(list) =
                attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
            {
                existing.extend(list);
            }
        } else {
            retained.push(attr.clone());
        }
    }
    (retained, existing)
}

// 归一化 derive 的 key，避免 Serialize 与 serde::Serialize 重复
fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => {
            let ident = last.ident.to_string();
            match ident.as_str() {
                "Serialize" | "Deserialize" => format!("serde::{ident}"),
                _ => ident,
            }
        }
        None => p.to_token_stream().to_string(),
    }
}

/// 将 required 与已有 derive 合并（去重，required 优先），derive 放在属性最前，
/// 以保证 `#[serde(...)]` 等辅助属性位于 derive 之后。
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let (retained, existing) = split_derives(attrs);

    let mut seen = std::collections::HashSet::<String>::new();
    let mut merged: Vec<syn::Path> = Vec::new();
    for p in required.into_iter().chain(existing) {
        if seen.insert(derive_key(&p)) {
            merged.push(p);
        }
    }

    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(retained).collect();
}

pub(crate) fn field_ident_is(field: &Field, name: &str) -> bool {
    field.ident.as_ref().map(|i| i == name).unwrap_or(false)
}

/// 确保具名字段结构体包含所需字段
/// - `leading`：按顺序放在最前；若已存在则复用原定义并移动到前面
/// - `trailing`：仅在缺失时追加到末尾
pub(crate) fn ensure_fields(fields_named: &mut FieldsNamed, leading: Vec<Field>, trailing: Vec<Field>) {
    let old_named = fields_named.named.clone();
    let mut new_named: Punctuated<Field, Token![,]> = Punctuated::new();

    let name_of = |f: &Field| f.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
    let leading_names: Vec<String> = leading.iter().map(name_of).collect();

    for required in leading {
        let name = name_of(&required);
        match old_named.iter().find(|f| field_ident_is(f, &name)) {
            Some(existing) => new_named.push(existing.clone()),
            None => new_named.push(required),
        }
    }

    for f in old_named.iter() {
        if !leading_names.iter().any(|n| field_ident_is(f, n)) {
            new_named.push(f.clone());
        }
    }

    for required in trailing {
        let name = name_of(&required);
        if !old_named.iter().any(|f| field_ident_is(f, &name)) {
            new_named.push(required);
        }
    }

    fields_named.named = new_named;
}
