//! Proc macros for Dungeon Master tool definitions.
//!
//! Provides `#[derive(Tool)]`, which turns a tool's argument struct into a
//! tool name, a description and a JSON input schema. The same struct is the
//! `serde` target for the tool's arguments, so the macro reads the `serde`
//! attributes that change the wire shape (`rename`, `rename_all`, `default`)
//! and the schema always matches what deserialization accepts.
//!
//! # Example
//!
//! ```ignore
//! /// Roll dice using standard notation
//! #[derive(Tool, Deserialize)]
//! #[tool(name = "roll_dice")]
//! struct RollDiceArgs {
//!     /// Dice notation like "2d6+3" or "1d20"
//!     notation: String,
//!     /// What the roll is for
//!     #[serde(default)]
//!     context: String,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{parse_macro_input, DeriveInput, Field, Lit, LitStr, Meta, Token, Type};

/// Derive macro for generating tool definitions.
///
/// # Attributes
///
/// - `#[tool(name = "...")]` - Override the tool name (defaults to snake_case struct name)
/// - `#[tool(optional)]` on fields - Mark field as optional in JSON schema
/// - `#[tool(required)]` on fields - List the field as required even when it is
///   an `Option` (the tool still tolerates its absence)
/// - `#[tool(rename = "...")]` on fields - Override field name in schema
///
/// `#[serde(rename_all = "camelCase")]`, `#[serde(rename = "...")]` and
/// `#[serde(default)]` are honoured as well.
#[proc_macro_derive(Tool, attributes(tool))]
pub fn derive_tool(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_tool(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[derive(Default)]
struct ContainerAttrs {
    name: Option<String>,
    camel_case: bool,
}

#[derive(Default)]
struct FieldAttrs {
    tool_rename: Option<String>,
    serde_rename: Option<String>,
    optional: bool,
    required: bool,
}

fn expand_tool(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let container = container_attrs(&input)?;

    let tool_name = container
        .name
        .clone()
        .unwrap_or_else(|| to_snake_case(&struct_name.to_string()));
    let description = get_doc_comment(&input.attrs);

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            syn::Fields::Unit => Vec::new(),
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Tool derive only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Tool derive only supports structs")),
    };

    let mut property_tokens = Vec::new();
    let mut required_fields = Vec::new();

    for field in fields {
        let attrs = field_attrs(field)?;
        let field_name_str = wire_name(field, &attrs, &container)?;
        let field_desc = get_doc_comment(&field.attrs);
        let field_type = &field.ty;

        let type_schema = type_to_schema(field_type);

        let desc_token = if field_desc.is_empty() {
            quote! {}
        } else {
            quote! { property["description"] = serde_json::json!(#field_desc); }
        };

        property_tokens.push(quote! {
            {
                let mut property = #type_schema;
                #desc_token
                properties.insert(#field_name_str.to_string(), property);
            }
        });

        if attrs.required || (!attrs.optional && !is_option_type(field_type)) {
            required_fields.push(field_name_str);
        }
    }

    Ok(quote! {
        impl #struct_name {
            /// Get the tool name.
            pub fn tool_name() -> &'static str {
                #tool_name
            }

            /// Get the tool description.
            pub fn tool_description() -> &'static str {
                #description
            }

            /// Generate the JSON schema for this tool's input.
            pub fn input_schema() -> serde_json::Value {
                #[allow(unused_mut)]
                let mut properties = serde_json::Map::new();
                #(#property_tokens)*

                let required: Vec<&str> = vec![#(#required_fields),*];

                serde_json::json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                })
            }

            /// Create the catalogue entry for this tool.
            pub fn as_tool() -> dm_core::ToolDefinition {
                dm_core::ToolDefinition {
                    name: Self::tool_name().to_string(),
                    description: Self::tool_description().to_string(),
                    input_schema: Self::input_schema(),
                }
            }
        }
    })
}

fn container_attrs(input: &DeriveInput) -> syn::Result<ContainerAttrs> {
    let mut out = ContainerAttrs::default();
    for attr in &input.attrs {
        if attr.path().is_ident("tool") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.name = Some(s.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported tool attribute"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                    let s: LitStr = meta.value()?.parse()?;
                    out.camel_case = s.value() == "camelCase";
                    Ok(())
                } else {
                    skip_meta(meta)
                }
            })?;
        }
    }
    Ok(out)
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in &field.attrs {
        if attr.path().is_ident("tool") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("optional") {
                    out.optional = true;
                    Ok(())
                } else if meta.path.is_ident("required") {
                    out.required = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let s: LitStr = meta.value()?.parse()?;
                    out.tool_rename = Some(s.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported tool attribute"))
                }
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    let s: LitStr = meta.value()?.parse()?;
                    out.serde_rename = Some(s.value());
                    Ok(())
                } else if meta.path.is_ident("default") {
                    out.optional = true;
                    skip_meta(meta)
                } else {
                    skip_meta(meta)
                }
            })?;
        }
    }
    Ok(out)
}

/// Consume a serde meta item the macro has no use for.
fn skip_meta(meta: ParseNestedMeta<'_>) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(skip_meta)?;
    }
    Ok(())
}

fn wire_name(field: &Field, attrs: &FieldAttrs, container: &ContainerAttrs) -> syn::Result<String> {
    if let Some(name) = attrs.tool_rename.as_ref().or(attrs.serde_rename.as_ref()) {
        return Ok(name.clone());
    }
    let ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
    let name = ident.to_string();
    Ok(if container.camel_case {
        to_camel_case(&name)
    } else {
        name
    })
}

fn get_doc_comment(attrs: &[syn::Attribute]) -> String {
    let mut docs = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("doc") {
            if let Meta::NameValue(nv) = &attr.meta {
                if let syn::Expr::Lit(expr_lit) = &nv.value {
                    if let Lit::Str(s) = &expr_lit.lit {
                        docs.push(s.value().trim().to_string());
                    }
                }
            }
        }
    }
    docs.join(" ")
}

fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

fn first_generic(segment: &syn::PathSegment) -> Option<&Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
            return Some(inner);
        }
    }
    None
}

fn type_to_schema(ty: &Type) -> TokenStream2 {
    let Type::Path(type_path) = ty else {
        return quote! { serde_json::json!({}) };
    };
    let Some(segment) = type_path.path.segments.last() else {
        return quote! { serde_json::json!({}) };
    };

    match segment.ident.to_string().as_str() {
        "String" | "str" => quote! { serde_json::json!({"type": "string"}) },
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            quote! { serde_json::json!({"type": "integer"}) }
        }
        "f32" | "f64" => quote! { serde_json::json!({"type": "number"}) },
        "bool" => quote! { serde_json::json!({"type": "boolean"}) },
        "Option" => match first_generic(segment) {
            Some(inner) => type_to_schema(inner),
            None => quote! { serde_json::json!({}) },
        },
        "Vec" => match first_generic(segment) {
            Some(inner) => {
                let inner_schema = type_to_schema(inner);
                quote! {
                    serde_json::json!({
                        "type": "array",
                        "items": #inner_schema
                    })
                }
            }
            None => quote! { serde_json::json!({"type": "array"}) },
        },
        // Arbitrary JSON: any type is accepted.
        "Value" => quote! { serde_json::json!({}) },
        _ => quote! { serde_json::json!({"type": "object"}) },
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = !result.is_empty();
        } else if upper_next {
            result.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}
