//! Derives `Display`/`FromStr` for "stringoid" enums: single-field tuple
//! variants whose wire representation is `<discriminant>:<field>`, where
//! `<field>` contributes its own `Display`/`FromStr`.
//!
//! ```ignore
//! #[derive(catverters_derive::Stringoid)]
//! enum Mount {
//!     #[discriminant = "ro"]
//!     ReadOnly(String),
//! }
//! ```
//! produces a `Display` impl writing `"ro:{0}"` and a `FromStr` impl that
//! recognizes the `"ro:"` prefix and parses the remainder.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Lit, Meta};

#[proc_macro_derive(Stringoid, attributes(discriminant))]
pub fn derive_stringoid(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let name = input.ident;

	let Data::Enum(data) = input.data else {
		return syn::Error::new_spanned(name, "Stringoid can only be derived for enums")
			.to_compile_error()
			.into();
	};

	let mut display_arms = Vec::new();
	let mut parse_arms = Vec::new();

	for variant in data.variants {
		let variant_ident = variant.ident.clone();
		let discriminant = match find_discriminant(&variant.attrs) {
			Some(d) => d,
			None => {
				return syn::Error::new_spanned(
					&variant_ident,
					"variant is missing #[discriminant = \"...\"]",
				)
				.to_compile_error()
				.into();
			}
		};
		let Fields::Unnamed(fields) = &variant.fields else {
			return syn::Error::new_spanned(
				&variant_ident,
				"Stringoid variants must be single-field tuple variants",
			)
			.to_compile_error()
			.into();
		};
		if fields.unnamed.len() != 1 {
			return syn::Error::new_spanned(
				&variant_ident,
				"Stringoid variants must have exactly one field",
			)
			.to_compile_error()
			.into();
		}

		let prefix = format!("{discriminant}:");
		display_arms.push(quote! {
			#name::#variant_ident(inner) => write!(f, "{}{}", #prefix, inner),
		});
		parse_arms.push(quote! {
			if let Some(rest) = s.strip_prefix(#prefix) {
				return rest
					.parse()
					.map(#name::#variant_ident)
					.map_err(|_| ::catverters::StringoidParseError {
						type_name: stringify!(#name),
						input: s.to_string(),
					});
			}
		});
	}

	let type_name_str = name.to_string();
	let expanded = quote! {
		impl ::std::fmt::Display for #name {
			fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
				match self {
					#(#display_arms)*
				}
			}
		}

		impl ::std::str::FromStr for #name {
			type Err = ::catverters::StringoidParseError;

			fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
				#(#parse_arms)*
				Err(::catverters::StringoidParseError {
					type_name: #type_name_str,
					input: s.to_string(),
				})
			}
		}
	};

	expanded.into()
}

fn find_discriminant(attrs: &[syn::Attribute]) -> Option<String> {
	for attr in attrs {
		if !attr.path().is_ident("discriminant") {
			continue;
		}
		let Meta::NameValue(nv) = &attr.meta else {
			continue;
		};
		if let syn::Expr::Lit(expr_lit) = &nv.value {
			if let Lit::Str(lit_str) = &expr_lit.lit {
				return Some(lit_str.value());
			}
		}
	}
	None
}
