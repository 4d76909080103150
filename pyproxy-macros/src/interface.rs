// #[foreign_interface] proc-macro implementation
//
// Expansion of
//
//     #[foreign_interface(module = "Car", class = "Car")]
//     pub trait Car {
//         #[forward(name = "getNumberPlate")]
//         fn number_plate(&self) -> Result<Option<String>>;
//     }
//
// is the trait itself (markers removed), plus:
//
//     pub struct CarProxy { instance: ::pyproxy::ProxyInstance }
//     impl ::pyproxy::ForeignInterface for dyn Car { .. }
//     impl Car for CarProxy {
//         fn number_plate(&self) -> Result<Option<String>> {
//             self.instance
//                 .invoke_as::<Option<String>>("number_plate", &[])
//                 .map_err(From::from)
//         }
//     }

use crate::attrs::{take_forward, InterfaceArgs};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    FnArg, GenericArgument, Ident, ItemTrait, LitStr, Pat, PathArguments, Result, ReturnType,
    Signature, TraitItem, TraitItemFn, Type,
};

struct Operation {
    name: Ident,
    arity: usize,
    forward: Option<Option<LitStr>>,
}

pub fn expand_interface(args: InterfaceArgs, mut input: ItemTrait) -> Result<TokenStream> {
    if !input.generics.params.is_empty() || input.generics.where_clause.is_some() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "generic traits cannot be bound to a foreign class",
        ));
    }

    let trait_ident = input.ident.clone();
    let vis = input.vis.clone();
    let proxy_ident = args
        .proxy
        .clone()
        .unwrap_or_else(|| format_ident!("{}Proxy", trait_ident));

    let mut operations = Vec::new();
    let mut forwarded_methods = Vec::new();

    for item in &mut input.items {
        match item {
            TraitItem::Fn(method) => {
                let forward = take_forward(&mut method.attrs)?;
                let arity = typed_inputs(&method.sig)?.len();

                match &forward {
                    Some(_) => forwarded_methods.push(forwarding_method(method)?),
                    None if method.default.is_none() => {
                        return Err(syn::Error::new_spanned(
                            &method.sig,
                            format!(
                                "method `{}` has no default body and is not marked #[forward]; \
                                 every required method of a foreign interface must be forwarded",
                                method.sig.ident
                            ),
                        ));
                    }
                    None => {}
                }

                operations.push(Operation {
                    name: method.sig.ident.clone(),
                    arity,
                    forward: forward.map(|f| f.name),
                });
            }
            TraitItem::Const(constant) if constant.default.is_some() => {}
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "foreign interfaces may only contain methods and constants with defaults",
                ));
            }
        }
    }

    let interface_name = trait_ident.to_string();
    let binding = binding_tokens(&args);
    let operation_specs = operations.iter().map(operation_tokens);

    Ok(quote! {
        #input

        /// Generated proxy forwarding to a foreign object.
        #vis struct #proxy_ident {
            instance: ::pyproxy::ProxyInstance,
        }

        impl #proxy_ident {
            /// Underlying proxy instance.
            pub fn instance(&self) -> &::pyproxy::ProxyInstance {
                &self.instance
            }

            pub fn into_instance(self) -> ::pyproxy::ProxyInstance {
                self.instance
            }
        }

        impl ::core::fmt::Debug for #proxy_ident {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.debug_struct(::core::stringify!(#proxy_ident))
                    .field("instance", &self.instance)
                    .finish()
            }
        }

        impl ::pyproxy::ForeignInterface for dyn #trait_ident {
            type Proxy = #proxy_ident;

            fn spec() -> ::pyproxy::InterfaceSpec {
                ::pyproxy::InterfaceSpec::new(#interface_name)
                    #binding
                    #(.with_operation(#operation_specs))*
            }

            fn wrap(instance: ::pyproxy::ProxyInstance) -> Self::Proxy {
                #proxy_ident { instance }
            }
        }

        impl #trait_ident for #proxy_ident {
            #(#forwarded_methods)*
        }
    })
}

fn binding_tokens(args: &InterfaceArgs) -> TokenStream {
    let (module, class) = match (&args.module, &args.class) {
        (Some(module), Some(class)) => (module, class),
        _ => return quote! {},
    };

    if args.constructor_args.is_empty() {
        return quote! {
            .with_binding(::pyproxy::Binding::new(#module, #class))
        };
    }

    let kinds = &args.constructor_args;
    quote! {
        .with_binding(
            ::pyproxy::Binding::new(#module, #class)
                .with_constructor_args([#(::pyproxy::ValueKind::#kinds),*])
        )
    }
}

fn operation_tokens(op: &Operation) -> TokenStream {
    let name = op.name.unraw().to_string();
    let arity = op.arity;
    match &op.forward {
        Some(Some(foreign)) => quote! {
            ::pyproxy::OperationSpec::forward(#name, #arity).renamed(#foreign)
        },
        Some(None) => quote! { ::pyproxy::OperationSpec::forward(#name, #arity) },
        None => quote! { ::pyproxy::OperationSpec::native(#name, #arity) },
    }
}

/// Argument names of a `&self` method.
fn typed_inputs(sig: &Signature) -> Result<Vec<Ident>> {
    let mut names = Vec::new();
    for arg in &sig.inputs {
        match arg {
            FnArg::Receiver(_) => {}
            FnArg::Typed(pat_type) => match &*pat_type.pat {
                Pat::Ident(pat_ident) => names.push(pat_ident.ident.clone()),
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "only simple identifiers are supported as arguments",
                    ))
                }
            },
        }
    }
    Ok(names)
}

/// Proxy implementation of a forwarded method. Calls go through the
/// dispatch table by operation name; the foreign name lives in the spec.
fn forwarding_method(method: &TraitItemFn) -> Result<TokenStream> {
    let sig = &method.sig;

    if let Some(body) = &method.default {
        return Err(syn::Error::new_spanned(
            body,
            "forwarded methods must not have a default body",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "generic methods cannot be forwarded",
        ));
    }
    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(sig, "async methods cannot be forwarded"));
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "forwarded methods must take `&self`",
            ))
        }
    }

    let ok_type = result_ok_type(sig)?;
    let operation = sig.ident.unraw().to_string();
    let args = typed_inputs(sig)?;

    Ok(quote! {
        #sig {
            self.instance
                .invoke_as::<#ok_type>(
                    #operation,
                    &[#(::pyproxy::IntoValue::into_value(#args)),*],
                )
                .map_err(::core::convert::From::from)
        }
    })
}

/// `T` of a `Result<T, E>`-shaped return type.
fn result_ok_type(sig: &Signature) -> Result<&Type> {
    let ty = match &sig.output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                sig,
                "forwarded methods must return a Result",
            ))
        }
    };

    if let Type::Path(type_path) = &**ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Result" {
                if let PathArguments::AngleBracketed(generics) = &segment.arguments {
                    if let Some(GenericArgument::Type(ok)) = generics.args.first() {
                        return Ok(ok);
                    }
                }
            }
        }
    }

    Err(syn::Error::new_spanned(
        ty,
        "forwarded methods must return a Result<T, E> with E: From<BridgeError>",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_result_ok_type() {
        let sig: Signature = parse_quote!(fn plate(&self) -> pyproxy::Result<Option<String>>);
        let ok = result_ok_type(&sig).unwrap();
        assert_eq!(quote!(#ok).to_string(), quote!(Option<String>).to_string());

        let sig: Signature = parse_quote!(fn plate(&self) -> Result<(), MyError>);
        assert!(result_ok_type(&sig).is_ok());
    }

    #[test]
    fn test_non_result_return_rejected() {
        let sig: Signature = parse_quote!(fn plate(&self) -> Option<String>);
        let err = result_ok_type(&sig).unwrap_err();
        assert!(err.to_string().contains("must return a Result"));

        let sig: Signature = parse_quote!(fn plate(&self));
        assert!(result_ok_type(&sig).is_err());
    }

    #[test]
    fn test_raw_identifiers_are_unraw() {
        let method: TraitItemFn = parse_quote!(fn r#type(&self) -> Result<String>;);
        let op = Operation {
            name: method.sig.ident.clone(),
            arity: 0,
            forward: Some(None),
        };
        let tokens = operation_tokens(&op).to_string();
        assert!(tokens.contains("\"type\""));
        assert!(!tokens.contains("r#type"));

        let body = forwarding_method(&method).unwrap().to_string();
        assert!(body.contains("\"type\""));
    }
}
