use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, GenericArgument, Ident, PathArguments, Type, parse_macro_input};

/// Derives `new()` plus an `expr()` constructor that wraps the node in the
/// `Expr` enum variant of the same name. `Box<T>` fields are taken unboxed.
#[proc_macro_derive(ExpressionType)]
pub fn derive_expression_type(input: TokenStream) -> TokenStream {
    node_constructors(input, "Expr", "expr")
}

/// Same as `ExpressionType`, for statement nodes wrapped in `Stmt`.
#[proc_macro_derive(StatementType)]
pub fn derive_statement_type(input: TokenStream) -> TokenStream {
    node_constructors(input, "Stmt", "stmt")
}

fn node_constructors(input: TokenStream, wrapper: &str, wrap_fn: &str) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let wrapper = format_ident!("{}", wrapper);
    let wrap_fn = format_ident!("{}", wrap_fn);

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        _ => panic!("node constructors can only be derived for structs"),
    };

    let field_info: Vec<(Ident, Type)> = match fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|f| (f.ident.clone().unwrap(), f.ty.clone()))
            .collect(),
        _ => panic!("node constructors require named fields"),
    };
    let field_names: Vec<_> = field_info.iter().map(|(name, _)| name).collect();

    let deboxed_fields: Vec<_> = field_info
        .iter()
        .map(|(name, ty)| {
            let (ty, did_debox) = deboxed(ty);
            (name, ty, did_debox)
        })
        .collect();

    let deboxed_types: Vec<_> = deboxed_fields
        .iter()
        .map(|(_, ty, _)| {
            quote! { #ty }
        })
        .collect();

    let field_assigns: Vec<_> = deboxed_fields
        .iter()
        .map(|(name, _ty, must_rebox)| {
            if *must_rebox {
                quote! { #name: Box::new(#name) }
            } else {
                quote! { #name }
            }
        })
        .collect();

    let expanded = quote! {
        impl #name {
            pub fn #wrap_fn(#(#field_names: #deboxed_types),*) -> #wrapper {
                #wrapper::#name(Self::new(#(#field_names),*))
            }

            pub fn new(#(#field_names: #deboxed_types),*) -> Self {
                Self {
                    #(#field_assigns),*
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Strips one level of `Box<..>` off a field type, reporting whether the
/// constructor needs to re-box the argument.
fn deboxed(ty: &Type) -> (&Type, bool) {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident != "Box" {
                return (ty, false);
            }
            if let PathArguments::AngleBracketed(ref args) = segment.arguments {
                if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
                    return (inner_ty, true);
                }
            }
        }
    }
    (ty, false)
}
