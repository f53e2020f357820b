use darling::{ast, FromDeriveInput, FromField};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::Meta;

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs)]
struct EntityReceiver {
	ident: syn::Ident,

	generics: syn::Generics,

	data: ast::Data<(), EntityFieldReceiver>,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs)]
struct EntityFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

impl EntityFieldReceiver {
	/// Whether the client is allowed to supply this field, i.e. it does not
	/// carry `#[serde(skip)]` or `#[serde(skip_deserializing)]`.
	fn is_client_writable(&self) -> bool {
		!self.attrs.iter().any(|attr| {
			let Meta::List(ref list) = attr.meta else {
				return false;
			};

			list.path.is_ident("serde")
				&& list.tokens.to_token_stream().into_iter().any(|token| {
					matches!(token, TokenTree::Ident(ref ident) if ident == "skip_deserializing" || ident == "skip")
				})
		})
	}
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match EntityReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let entity = &receiver.ident;
	let vis = &input.vis;
	let generics = &receiver.generics;
	let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
	let create_ident = format_ident!("Create{}", entity);
	let update_ident = format_ident!("Update{}", entity);

	let attrs = &receiver.attrs;

	let Some(fields) = receiver.data.take_struct() else {
		return syn::Error::new_spanned(entity, "#[model] only supports structs with named fields")
			.into_compile_error()
			.into();
	};

	let fields = fields
		.iter()
		.filter(|field| field.is_client_writable())
		.filter_map(|field| Some((field.ident.as_ref()?, field)))
		.collect::<Vec<_>>();

	let create_fields = fields.iter().map(|(ident, field)| {
		let (attrs, ty, vis) = (&field.attrs, &field.ty, &field.vis);

		quote! {
			#(#attrs)*
			#vis #ident: #ty,
		}
	});

	let update_fields = fields.iter().map(|(ident, field)| {
		let (attrs, ty, vis) = (&field.attrs, &field.ty, &field.vis);

		quote! {
			#(#attrs)*
			#vis #ident: Option<#ty>,
		}
	});

	let assignments = fields.iter().map(|(ident, _)| {
		quote! {
			if let Some(value) = self.#ident {
				target.#ident = value;
			}
		}
	});

	quote! {
		#input

		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#create_fields
			)*
		}

		#(#attrs)*
		#vis struct #update_ident #generics {
			#(
				#update_fields
			)*
		}

		impl #impl_generics #update_ident #ty_generics #where_clause {
			/// Overwrites every field of `target` that was provided in this update.
			#[allow(dead_code)]
			pub fn apply(self, target: &mut #entity #ty_generics) {
				#(
					#assignments
				)*
			}
		}
	}
	.into()
}
