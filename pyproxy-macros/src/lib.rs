// pyproxy-macros: proxy generation for pyproxy interfaces
//
// Provides:
// - #[foreign_interface] - binds a trait to a foreign class and generates
//   the proxy type implementing it
// - #[forward] - marks a trait method as routed to the foreign object
//   (only meaningful inside a #[foreign_interface] trait)

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemTrait};

mod attrs;
mod interface;

/// Binds a trait to a foreign module/class and generates its proxy.
///
/// Arguments (all optional, `module` and `class` go together):
/// - `module = "..."`, `class = "..."`: foreign class instantiated by
///   `Bridge::create_proxy_instance`
/// - `constructor_args(int, str, ...)`: declared constructor argument types
/// - `proxy = Name`: name of the generated proxy struct (default `<Trait>Proxy`)
///
/// Every required method must carry `#[forward]` (or
/// `#[forward(name = "fooBar")]` to call a differently named foreign
/// method). Forwarded methods take `&self` and return `Result<T, E>` where
/// `T: FromValue` and `E: From<BridgeError>`. Methods with a default body
/// stay native.
///
/// # Example
///
/// ```ignore
/// #[foreign_interface(module = "Car", class = "Car")]
/// pub trait Car {
///     #[forward(name = "getNumberPlate")]
///     fn number_plate(&self) -> pyproxy::Result<Option<String>>;
/// }
///
/// let car = bridge.create_proxy_instance::<dyn Car>(&pyproxy::args!["PLATE-1"])?;
/// assert_eq!(car.number_plate()?.as_deref(), Some("PLATE-1"));
/// ```
#[proc_macro_attribute]
pub fn foreign_interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemTrait);
    attrs::InterfaceArgs::parse(attr.into())
        .and_then(|args| interface::expand_interface(args, input))
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Marks a method of a `#[foreign_interface]` trait as forwarded.
///
/// `#[foreign_interface]` consumes these markers; reaching this function
/// means the attribute was used outside such a trait.
#[proc_macro_attribute]
pub fn forward(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = proc_macro2::TokenStream::from(item);
    let error = syn::Error::new(
        proc_macro2::Span::call_site(),
        "#[forward] is only valid on methods of a #[foreign_interface] trait",
    )
    .to_compile_error();
    quote::quote!(#error #item).into()
}
