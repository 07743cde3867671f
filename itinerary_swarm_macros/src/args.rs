use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    Expr, ExprLit, Lit, LitStr, MetaNameValue, Path, Token,
};

/// Arguments of `#[completion_schema(...)]`.
#[derive(Default)]
pub struct SchemaArgs {
    pub name: Option<LitStr>,
    pub description: Option<LitStr>,
    pub normalize: Option<Path>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &syn::Ident) -> syn::Result<()> {
    if slot.is_some() {
        return Err(syn::Error::new(
            key.span(),
            format!("duplicate `{}` argument", key),
        ));
    }
    *slot = Some(value);
    Ok(())
}

impl Parse for SchemaArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = SchemaArgs::default();

        for pair in Punctuated::<MetaNameValue, Token![,]>::parse_terminated(input)? {
            let key = pair
                .path
                .get_ident()
                .ok_or_else(|| syn::Error::new_spanned(&pair.path, "expected identifier"))?;

            let Expr::Lit(ExprLit {
                lit: Lit::Str(value),
                ..
            }) = &pair.value
            else {
                return Err(syn::Error::new_spanned(
                    &pair.value,
                    "expected string literal value",
                ));
            };

            match key.to_string().as_str() {
                "name" => set_once(&mut args.name, value.clone(), key)?,
                "description" => set_once(&mut args.description, value.clone(), key)?,
                "normalize" => set_once(&mut args.normalize, value.parse::<Path>()?, key)?,
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!(
                            "unsupported argument `{}`; expected name, description or normalize",
                            other
                        ),
                    ))
                }
            }
        }

        Ok(args)
    }
}
