//! Resolution of stored identifiers into the documents they refer to.
//!
//! A population path is split on `.` and walked segment by segment. Identifiers are
//! looked up on the model named by the field's `reference` option, or on the model
//! that owns the field when none is declared. A single identifier that matches
//! nothing is left in place; any other lookup failure aborts the walk.

use bson::Bson;
use futures::{FutureExt, TryStreamExt, future::BoxFuture, stream};
use std::collections::HashMap;
use tracing::{trace, warn};

use crate::{
    document::Document,
    error::{ModelError, ModelResult},
    live::LiveObject,
    model::Model,
    path::FieldPath,
    types::TypeKind,
    value::Value,
};

pub(crate) async fn populate(document: &mut Document, path: &str) -> ModelResult<()> {
    let parts = path
        .split('.')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    let owner = document.model().clone();

    walk(document.root_mut(), owner, &parts, path).await
}

fn walk<'a>(
    object: &'a mut LiveObject,
    owner: Model,
    parts: &'a [&'a str],
    full: &'a str,
) -> BoxFuture<'a, ModelResult<()>> {
    async move {
        let Some((segment, rest)) = parts.split_first() else {
            return Ok(());
        };

        let target = reference_model(object, segment, &owner)
            .map_err(|err| ModelError::population(full, err))?;
        let at = object.path().key(*segment);

        match object.value_mut(segment) {
            Some(slot) => resolve(slot, at, target, owner, rest, full).await,
            None => {
                trace!(path = full, segment = *segment, "nothing to populate");
                Ok(())
            }
        }
    }
    .boxed()
}

/// Picks the model identifiers in `key` refer to.
fn reference_model(object: &LiveObject, key: &str, owner: &Model) -> ModelResult<Model> {
    let Some(ty) = object.shape().field(key) else {
        return Ok(owner.clone());
    };

    let reference = ty.rules().reference.as_ref().or_else(|| match ty.kind() {
        TypeKind::Array(Some(element)) => element.rules().reference.as_ref(),
        _ => None,
    });

    match reference {
        Some(name) => owner.store()?.model(name),
        None => Ok(owner.clone()),
    }
}

fn resolve<'a>(
    slot: &'a mut Value,
    at: FieldPath,
    target: Model,
    owner: Model,
    rest: &'a [&'a str],
    full: &'a str,
) -> BoxFuture<'a, ModelResult<()>> {
    async move {
        match slot {
            Value::Scalar(Bson::String(id)) => {
                let found = target
                    .find_by_id(id.as_str())
                    .exec()
                    .await
                    .map_err(|err| ModelError::population(full, err))?
                    .into_document();

                let Some(document) = found else {
                    warn!(
                        path = full,
                        model = target.name(),
                        id = id.as_str(),
                        "reference not found, leaving identifier"
                    );
                    return Ok(());
                };

                let mut value = Value::from(document);
                value.rebase(&at);
                *slot = value;

                descend(slot, owner, rest, full).await
            }
            Value::Array(array) if starts_with_id(array.get(0)) => {
                let ids = array
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_owned))
                    .collect::<Vec<_>>();

                let found = target
                    .find_by_id(ids)
                    .exec()
                    .await
                    .map_err(|err| ModelError::population(full, err))?
                    .into_results()
                    .into_iter()
                    .filter_map(|document| Some((document.id()?.to_string(), document)))
                    .collect::<HashMap<_, _>>();

                for index in 0..array.len() {
                    let document = array
                        .get(index)
                        .and_then(Value::as_str)
                        .and_then(|id| found.get(id));

                    if let Some(document) = document {
                        array.replace(index, Value::from(document.clone()));
                    }
                }

                each(array.items_mut(), &owner, rest, full).await
            }
            Value::Array(array) => each(array.items_mut(), &owner, rest, full).await,
            _ => descend(slot, owner, rest, full).await,
        }
    }
    .boxed()
}

fn starts_with_id(first: Option<&Value>) -> bool {
    first.is_some_and(|value| value.as_str().is_some())
}

/// Continues the walk into every element of an array.
async fn each<'a>(
    items: std::slice::IterMut<'a, Value>,
    owner: &Model,
    rest: &'a [&'a str],
    full: &'a str,
) -> ModelResult<()> {
    if rest.is_empty() {
        return Ok(());
    }

    stream::iter(items.map(Ok::<_, ModelError>))
        .try_for_each_concurrent(owner.config().concurrency, |item| {
            descend(item, owner.clone(), rest, full)
        })
        .await
}

/// Continues the walk into a nested object or document. Plain objects keep the owner's
/// model; documents bring their own.
fn descend<'a>(
    value: &'a mut Value,
    owner: Model,
    rest: &'a [&'a str],
    full: &'a str,
) -> BoxFuture<'a, ModelResult<()>> {
    async move {
        if rest.is_empty() {
            return Ok(());
        }

        match value {
            Value::Object(object) => walk(object, owner, rest, full).await,
            Value::Document(document) => {
                let owner = document.model().clone();
                walk(document.root_mut(), owner, rest, full).await
            }
            _ => Ok(()),
        }
    }
    .boxed()
}
