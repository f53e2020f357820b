mod model;

use proc_macro::TokenStream;

/// Creates two new structs for an entity: `CreateX` and `UpdateX`.
///
/// Fields marked `#[serde(skip)]` or `#[serde(skip_deserializing)]` are server-owned
/// and left out of both. Every other field is copied verbatim (attributes included),
/// wrapped in an `Option` for `UpdateX`. `UpdateX::apply` writes the provided fields
/// onto an existing entity.
#[proc_macro_attribute]
pub fn model(_args: TokenStream, input: TokenStream) -> TokenStream {
	model::from_input(input)
}
