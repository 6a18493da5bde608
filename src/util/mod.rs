//! URI query string utilities.
use iref::{
	UriBuf,
	uri::{Query, QueryBuf},
};
use serde::Serialize;

use crate::error::Error;

/// Extends the query parameters of a URI by serializing `value` as
/// `application/x-www-form-urlencoded` and appending the result.
///
/// Existing query parameters on the URI are preserved.
pub fn extend_uri_query<T: Serialize>(uri: &mut UriBuf, value: T) -> Result<(), Error> {
	let query = serialize_concat_query(
		uri.query().map(ToOwned::to_owned).unwrap_or_default(),
		value,
	)?;

	if !query.is_empty() {
		uri.set_query(Some(&*query));
	}

	Ok(())
}

/// Serializes `value` as form-urlencoded data and concatenates it with the
/// existing query string.
pub fn serialize_concat_query<T>(query: QueryBuf, value: T) -> Result<QueryBuf, Error>
where
	T: Serialize,
{
	let serialized = serde_html_form::to_string(value).map_err(Error::invalid_state)?;
	let other = QueryBuf::new(serialized.into_bytes()).map_err(|_| {
		Error::invalid_state("form serializer produced an invalid URI query")
	})?;
	concat_query(query, &other)
}

/// Concatenates two query strings with `&` as separator.
///
/// If either query is empty, the other is returned as-is without a
/// separator.
pub fn concat_query(query: QueryBuf, other: &Query) -> Result<QueryBuf, Error> {
	let mut query = query.into_string();

	if !query.is_empty() && !other.is_empty() {
		query.push('&')
	}

	query.push_str(other.as_str());

	QueryBuf::new(query.into_bytes())
		.map_err(|_| Error::invalid_state("concatenated query is not a valid URI query"))
}

/// Builds a query made of value-less keys (`a&b&c`), percent-encoding each
/// key.
pub fn keys_query<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
	keys.into_iter()
		.map(|key| url::form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>())
		.collect::<Vec<_>>()
		.join("&")
}

/// Returns the query component of a URI string, without the fragment.
pub fn query_of(uri: &str) -> &str {
	let without_fragment = uri.split_once('#').map_or(uri, |(head, _)| head);
	without_fragment
		.split_once('?')
		.map_or("", |(_, query)| query)
}

/// Decodes a form-urlencoded query into its ordered key/value pairs.
///
/// Keys without a value decode with an empty value.
pub fn parse_query(query: &str) -> Result<Vec<(String, String)>, Error> {
	serde_html_form::from_str(query).map_err(Error::invalid_response)
}

/// Decodes the query of `uri`, dropping every parameter whose key already
/// appears in the query of `base`.
///
/// A redirect URI may carry its own parameters; those are echoed back by the
/// server and are not part of the response.
pub fn response_parameters(uri: &str, base: Option<&str>) -> Result<Vec<(String, String)>, Error> {
	let mut parameters = parse_query(query_of(uri))?;

	if let Some(base) = base {
		let own = parse_query(query_of(base))?;
		parameters.retain(|(key, _)| !own.iter().any(|(own_key, _)| own_key == key));
	}

	Ok(parameters)
}
