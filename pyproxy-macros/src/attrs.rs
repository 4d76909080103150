// Attribute argument parsing for #[foreign_interface] and #[forward]

use proc_macro2::TokenStream;
use syn::{Attribute, Ident, LitStr, Meta, Result};

/// Value kinds accepted in `constructor_args(...)`, with their variant names.
const VALUE_KINDS: &[(&str, &str)] = &[
    ("any", "Any"),
    ("none", "None"),
    ("bool", "Bool"),
    ("int", "Int"),
    ("float", "Float"),
    ("str", "Str"),
    ("list", "List"),
    ("map", "Map"),
    ("object", "Object"),
];

#[derive(Default)]
pub struct InterfaceArgs {
    pub module: Option<LitStr>,
    pub class: Option<LitStr>,
    /// `ValueKind` variant names, already validated
    pub constructor_args: Vec<Ident>,
    pub proxy: Option<Ident>,
}

impl InterfaceArgs {
    pub fn parse(attr: TokenStream) -> Result<Self> {
        let mut args = Self::default();

        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("module") {
                args.module = Some(non_empty(meta.value()?.parse()?)?);
                Ok(())
            } else if meta.path.is_ident("class") {
                args.class = Some(non_empty(meta.value()?.parse()?)?);
                Ok(())
            } else if meta.path.is_ident("proxy") {
                args.proxy = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("constructor_args") {
                meta.parse_nested_meta(|nested| {
                    let name = nested
                        .path
                        .get_ident()
                        .ok_or_else(|| nested.error("expected a value kind such as `int` or `str`"))?;
                    let variant = VALUE_KINDS
                        .iter()
                        .find(|(kind, _)| *name == *kind)
                        .map(|(_, variant)| *variant)
                        .ok_or_else(|| {
                            nested.error(format!(
                                "unknown value kind `{}`; expected one of: {}",
                                name,
                                VALUE_KINDS.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(", ")
                            ))
                        })?;
                    args.constructor_args.push(Ident::new(variant, name.span()));
                    Ok(())
                })
            } else {
                Err(meta.error("unsupported foreign_interface argument"))
            }
        });
        syn::parse::Parser::parse2(parser, attr)?;

        match (&args.module, &args.class) {
            (Some(_), None) | (None, Some(_)) => Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "`module` and `class` must be given together",
            )),
            (None, None) if !args.constructor_args.is_empty() => Err(syn::Error::new(
                proc_macro2::Span::call_site(),
                "`constructor_args` requires `module` and `class`",
            )),
            _ => Ok(args),
        }
    }
}

fn non_empty(lit: LitStr) -> Result<LitStr> {
    if lit.value().trim().is_empty() {
        return Err(syn::Error::new_spanned(lit, "name must not be empty"));
    }
    Ok(lit)
}

/// Parsed `#[forward]` marker.
pub struct Forward {
    pub name: Option<LitStr>,
}

/// Strip the `#[forward]` marker from `attrs`, returning it if present.
pub fn take_forward(attrs: &mut Vec<Attribute>) -> Result<Option<Forward>> {
    let mut found = None;
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("forward") {
            kept.push(attr);
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(attr, "duplicate #[forward] attribute"));
        }

        let mut forward = Forward { name: None };
        match &attr.meta {
            Meta::Path(_) => {}
            Meta::List(_) => attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    forward.name = Some(non_empty(meta.value()?.parse()?)?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported forward argument; expected `name`"))
                }
            })?,
            Meta::NameValue(_) => {
                return Err(syn::Error::new_spanned(
                    attr,
                    "expected #[forward] or #[forward(name = \"...\")]",
                ))
            }
        }
        found = Some(forward);
    }

    *attrs = kept;
    Ok(found)
}
