//! jq pre-filtering of CLI inputs.
use anyhow::{Context, Result, anyhow};
use jaq_core::{Compiler, Ctx, RcIter, compile::Undefined, load};
use jaq_json::Val;
use serde_json::Value;

/// Run `filter_src` over `input`, returning every value it yields.
///
/// A filter may yield zero, one or many outputs; each becomes a separate
/// instance to validate.
pub fn apply(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let outputs = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    for (i, item) in outputs.enumerate() {
        let v = item.map_err(|e| anyhow!("jq `{filter_src}` failed: {e:?}"))?;
        // Val renders as JSON text
        let text = v.to_string();
        let value = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("jq output #{i} is not JSON: {text}"))?;
        out.push(value);
    }
    Ok(out)
}

fn parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let lines: Vec<String> = errs
        .into_iter()
        .map(|(file, err)| format!("cannot parse jq `{}`: {err:?}", file.code))
        .collect();
    anyhow!(lines.join("\n"))
}

fn undefined_errors(errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>) -> anyhow::Error {
    let mut lines = Vec::new();
    for (file, list) in errs {
        for (name, undef) in list {
            lines.push(format!("undefined `{name}` ({undef:?}) in jq `{}`", file.code));
        }
    }
    anyhow!(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selects_and_fans_out() {
        let doc = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        assert_eq!(apply(".data.items[]", &doc).unwrap(), vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(apply(".data.items | length", &doc).unwrap(), vec![json!(2)]);
        assert!(apply("empty", &doc).unwrap().is_empty());
    }

    #[test]
    fn reports_bad_filters() {
        assert!(apply(".[", &json!(null)).is_err());
        assert!(apply("no_such_function", &json!(null)).is_err());
    }
}
