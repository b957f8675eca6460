//! In-process keyspace backing the `redis-mock` engine
//!
//! Implements a practical subset of string, key, hash, list and set
//! commands with Redis reply semantics. One keyspace holds every logical
//! database; clients sharing a keyspace see each other's writes.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use redis::Value;
use tokio::time::Instant;

use crate::utils::CommandError;

enum Data {
    Str(Vec<u8>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
}

struct Entry {
    data: Data,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

type Db = HashMap<Vec<u8>, Entry>;

/// Shared in-memory store, one map per logical database
#[derive(Default)]
pub struct MockKeyspace {
    dbs: Mutex<HashMap<i64, Db>>,
}

impl MockKeyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `[command, ...args]` against logical database `db`
    pub fn execute(&self, db: i64, argv: &[Vec<u8>]) -> Result<Value, CommandError> {
        let (name, args) = argv
            .split_first()
            .ok_or_else(|| CommandError::Server("empty command".to_string()))?;
        let name = String::from_utf8_lossy(name).to_ascii_lowercase();

        let mut dbs = self.dbs.lock();
        let db = dbs.entry(db).or_default();
        let now = Instant::now();

        match name.as_str() {
            "ping" => match args {
                [] => Ok(Value::SimpleString("PONG".to_string())),
                [msg] => Ok(bulk(msg)),
                _ => Err(wrong_arity(&name)),
            },
            "echo" => {
                let [msg] = args else {
                    return Err(wrong_arity(&name));
                };
                Ok(bulk(msg))
            }
            "get" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Str(v), ..
                    }) => Ok(bulk(v)),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Nil),
                }
            }
            "set" => set(db, &name, args, now),
            "setnx" => {
                let [key, value] = args else {
                    return Err(wrong_arity(&name));
                };
                if live(db, key, now).is_some() {
                    return Ok(Value::Int(0));
                }
                db.insert(key.clone(), Entry::new(Data::Str(value.clone())));
                Ok(Value::Int(1))
            }
            "getset" => {
                let [key, value] = args else {
                    return Err(wrong_arity(&name));
                };
                let old = match live(db, key, now) {
                    Some(Entry {
                        data: Data::Str(v), ..
                    }) => bulk(v),
                    Some(_) => return Err(CommandError::WrongType),
                    None => Value::Nil,
                };
                db.insert(key.clone(), Entry::new(Data::Str(value.clone())));
                Ok(old)
            }
            "mget" => {
                if args.is_empty() {
                    return Err(wrong_arity(&name));
                }
                let values = args
                    .iter()
                    .map(|key| match live(db, key, now) {
                        Some(Entry {
                            data: Data::Str(v), ..
                        }) => bulk(v),
                        _ => Value::Nil,
                    })
                    .collect();
                Ok(Value::Array(values))
            }
            "mset" => {
                if args.is_empty() || args.len() % 2 != 0 {
                    return Err(wrong_arity(&name));
                }
                for pair in args.chunks(2) {
                    db.insert(pair[0].clone(), Entry::new(Data::Str(pair[1].clone())));
                }
                Ok(Value::Okay)
            }
            "del" => {
                if args.is_empty() {
                    return Err(wrong_arity(&name));
                }
                let removed = args
                    .iter()
                    .filter(|key| live(db, key, now).is_some() && db.remove(*key).is_some())
                    .count();
                Ok(Value::Int(removed as i64))
            }
            "exists" => {
                if args.is_empty() {
                    return Err(wrong_arity(&name));
                }
                let found = args.iter().filter(|key| live(db, key, now).is_some()).count();
                Ok(Value::Int(found as i64))
            }
            "expire" | "pexpire" => {
                let [key, amount] = args else {
                    return Err(wrong_arity(&name));
                };
                let amount = parse_int(amount)?;
                if live(db, key, now).is_none() {
                    return Ok(Value::Int(0));
                }
                if amount <= 0 {
                    db.remove(key.as_slice());
                    return Ok(Value::Int(1));
                }
                let at = deadline(now, amount, name == "expire", &name)?;
                if let Some(entry) = db.get_mut(key.as_slice()) {
                    entry.expires_at = Some(at);
                }
                Ok(Value::Int(1))
            }
            "ttl" | "pttl" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                let remaining = match live(db, key, now) {
                    None => return Ok(Value::Int(-2)),
                    Some(Entry {
                        expires_at: None, ..
                    }) => return Ok(Value::Int(-1)),
                    Some(Entry {
                        expires_at: Some(at),
                        ..
                    }) => at.saturating_duration_since(now),
                };
                let millis = remaining.as_millis() as i64;
                if name == "ttl" {
                    Ok(Value::Int((millis + 500) / 1000))
                } else {
                    Ok(Value::Int(millis))
                }
            }
            "persist" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(entry) if entry.expires_at.is_some() => {
                        entry.expires_at = None;
                        Ok(Value::Int(1))
                    }
                    _ => Ok(Value::Int(0)),
                }
            }
            "incr" | "decr" | "incrby" | "decrby" => {
                let (key, delta) = match (name.as_str(), args) {
                    ("incr", [key]) => (key, 1),
                    ("decr", [key]) => (key, -1),
                    ("incrby", [key, by]) => (key, parse_int(by)?),
                    ("decrby", [key, by]) => (key, parse_int(by)?.checked_neg().ok_or_else(not_an_integer)?),
                    _ => return Err(wrong_arity(&name)),
                };
                incr_by(db, key, delta, now)
            }
            "append" => {
                let [key, value] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Str(v), ..
                    }) => {
                        v.extend_from_slice(value);
                        Ok(Value::Int(v.len() as i64))
                    }
                    Some(_) => Err(CommandError::WrongType),
                    None => {
                        db.insert(key.clone(), Entry::new(Data::Str(value.clone())));
                        Ok(Value::Int(value.len() as i64))
                    }
                }
            }
            "strlen" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Str(v), ..
                    }) => Ok(Value::Int(v.len() as i64)),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Int(0)),
                }
            }
            "keys" => {
                let [pattern] = args else {
                    return Err(wrong_arity(&name));
                };
                db.retain(|_, entry| !entry.is_expired(now));
                let mut keys: Vec<&Vec<u8>> =
                    db.keys().filter(|key| glob_match(pattern, key)).collect();
                keys.sort();
                Ok(Value::Array(keys.into_iter().map(|k| bulk(k)).collect()))
            }
            "dbsize" => {
                db.retain(|_, entry| !entry.is_expired(now));
                Ok(Value::Int(db.len() as i64))
            }
            "flushdb" => {
                db.clear();
                Ok(Value::Okay)
            }
            "hset" => {
                if args.len() < 3 || args.len() % 2 != 1 {
                    return Err(wrong_arity(&name));
                }
                let hash = hash_mut(db, &args[0], now)?;
                let added = args[1..]
                    .chunks(2)
                    .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count();
                Ok(Value::Int(added as i64))
            }
            "hget" => {
                let [key, field] = args else {
                    return Err(wrong_arity(&name));
                };
                Ok(match hash_ref(db, key, now)? {
                    Some(hash) => hash.get(field).map_or(Value::Nil, |v| bulk(v)),
                    None => Value::Nil,
                })
            }
            "hdel" => {
                if args.len() < 2 {
                    return Err(wrong_arity(&name));
                }
                let removed = match hash_ref(db, &args[0], now)? {
                    Some(hash) => args[1..]
                        .iter()
                        .filter(|field| hash.remove(*field).is_some())
                        .count(),
                    None => 0,
                };
                remove_if_empty(db, &args[0]);
                Ok(Value::Int(removed as i64))
            }
            "hgetall" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                Ok(Value::Array(match hash_ref(db, key, now)? {
                    Some(hash) => hash.iter().flat_map(|(f, v)| [bulk(f), bulk(v)]).collect(),
                    None => Vec::new(),
                }))
            }
            "hexists" => {
                let [key, field] = args else {
                    return Err(wrong_arity(&name));
                };
                let found = hash_ref(db, key, now)?.map_or(false, |hash| hash.contains_key(field));
                Ok(Value::Int(found as i64))
            }
            "hlen" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                Ok(Value::Int(hash_ref(db, key, now)?.map_or(0, |hash| hash.len()) as i64))
            }
            "lpush" | "rpush" => {
                if args.len() < 2 {
                    return Err(wrong_arity(&name));
                }
                let list = list_mut(db, &args[0], now)?;
                for value in &args[1..] {
                    if name == "lpush" {
                        list.push_front(value.clone());
                    } else {
                        list.push_back(value.clone());
                    }
                }
                Ok(Value::Int(list.len() as i64))
            }
            "lrange" => {
                let [key, start, stop] = args else {
                    return Err(wrong_arity(&name));
                };
                let (start, stop) = (parse_int(start)?, parse_int(stop)?);
                let items = match live(db, key, now) {
                    Some(Entry {
                        data: Data::List(list),
                        ..
                    }) => match clamp_range(start, stop, list.len()) {
                        Some((from, to)) => list.range(from..=to).map(|v| bulk(v)).collect(),
                        None => Vec::new(),
                    },
                    Some(_) => return Err(CommandError::WrongType),
                    None => Vec::new(),
                };
                Ok(Value::Array(items))
            }
            "llen" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::List(list),
                        ..
                    }) => Ok(Value::Int(list.len() as i64)),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Int(0)),
                }
            }
            "sadd" => {
                if args.len() < 2 {
                    return Err(wrong_arity(&name));
                }
                let set = set_mut(db, &args[0], now)?;
                let added = args[1..]
                    .iter()
                    .filter(|member| set.insert((*member).clone()))
                    .count();
                Ok(Value::Int(added as i64))
            }
            "smembers" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Set(set),
                        ..
                    }) => Ok(Value::Array(set.iter().map(|m| bulk(m)).collect())),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Array(Vec::new())),
                }
            }
            "sismember" => {
                let [key, member] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Set(set),
                        ..
                    }) => Ok(Value::Int(set.contains(member) as i64)),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Int(0)),
                }
            }
            "scard" => {
                let [key] = args else {
                    return Err(wrong_arity(&name));
                };
                match live(db, key, now) {
                    Some(Entry {
                        data: Data::Set(set),
                        ..
                    }) => Ok(Value::Int(set.len() as i64)),
                    Some(_) => Err(CommandError::WrongType),
                    None => Ok(Value::Int(0)),
                }
            }
            _ => Err(CommandError::Server(format!("unknown command '{}'", name))),
        }
    }
}

fn bulk(data: &[u8]) -> Value {
    Value::BulkString(data.to_vec())
}

fn wrong_arity(name: &str) -> CommandError {
    CommandError::Server(format!("wrong number of arguments for '{}' command", name))
}

fn not_an_integer() -> CommandError {
    CommandError::Server("value is not an integer or out of range".to_string())
}

fn parse_int(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(not_an_integer)
}

/// Look up a key, evicting it first if it has expired
/// Expiry instant `amount` seconds (or milliseconds) from `now`
fn deadline(
    now: Instant,
    amount: i64,
    seconds: bool,
    command: &str,
) -> Result<Instant, CommandError> {
    let ttl = if seconds {
        Duration::from_secs(amount as u64)
    } else {
        Duration::from_millis(amount as u64)
    };
    now.checked_add(ttl).ok_or_else(|| {
        CommandError::Server(format!("invalid expire time in '{}' command", command))
    })
}

fn live<'a>(db: &'a mut Db, key: &[u8], now: Instant) -> Option<&'a mut Entry> {
    if db.get(key).map_or(false, |entry| entry.is_expired(now)) {
        db.remove(key);
    }
    db.get_mut(key)
}

fn remove_if_empty(db: &mut Db, key: &[u8]) {
    let empty = match db.get(key).map(|entry| &entry.data) {
        Some(Data::Hash(h)) => h.is_empty(),
        Some(Data::List(l)) => l.is_empty(),
        Some(Data::Set(s)) => s.is_empty(),
        _ => false,
    };
    if empty {
        db.remove(key);
    }
}

fn set(db: &mut Db, name: &str, args: &[Vec<u8>], now: Instant) -> Result<Value, CommandError> {
    let [key, value, options @ ..] = args else {
        return Err(wrong_arity(name));
    };

    let mut expires_at = None;
    let mut only_if_absent = false;
    let mut only_if_present = false;
    let mut keep_ttl = false;

    let mut options = options.iter();
    while let Some(option) = options.next() {
        match String::from_utf8_lossy(option).to_ascii_uppercase().as_str() {
            "NX" => only_if_absent = true,
            "XX" => only_if_present = true,
            "KEEPTTL" => keep_ttl = true,
            unit @ ("EX" | "PX") => {
                let amount = options
                    .next()
                    .ok_or_else(|| CommandError::Server("syntax error".to_string()))
                    .and_then(|raw| parse_int(raw))?;
                if amount <= 0 {
                    return Err(CommandError::Server(
                        "invalid expire time in 'set' command".to_string(),
                    ));
                }
                expires_at = Some(deadline(now, amount, unit == "EX", name)?);
            }
            _ => return Err(CommandError::Server("syntax error".to_string())),
        }
    }
    if only_if_absent && only_if_present {
        return Err(CommandError::Server("syntax error".to_string()));
    }

    let existing = live(db, key, now);
    let exists = existing.is_some();
    if (only_if_absent && exists) || (only_if_present && !exists) {
        return Ok(Value::Nil);
    }
    if keep_ttl && expires_at.is_none() {
        expires_at = existing.and_then(|entry| entry.expires_at);
    }

    db.insert(
        key.clone(),
        Entry {
            data: Data::Str(value.clone()),
            expires_at,
        },
    );
    Ok(Value::Okay)
}

fn incr_by(db: &mut Db, key: &[u8], delta: i64, now: Instant) -> Result<Value, CommandError> {
    let (current, expires_at) = match live(db, key, now) {
        Some(Entry {
            data: Data::Str(v),
            expires_at,
        }) => (parse_int(v)?, *expires_at),
        Some(_) => return Err(CommandError::WrongType),
        None => (0, None),
    };
    let next = current.checked_add(delta).ok_or_else(|| {
        CommandError::Server("increment or decrement would overflow".to_string())
    })?;
    db.insert(
        key.to_vec(),
        Entry {
            data: Data::Str(next.to_string().into_bytes()),
            expires_at,
        },
    );
    Ok(Value::Int(next))
}

fn hash_ref<'a>(
    db: &'a mut Db,
    key: &[u8],
    now: Instant,
) -> Result<Option<&'a mut BTreeMap<Vec<u8>, Vec<u8>>>, CommandError> {
    match live(db, key, now) {
        Some(Entry {
            data: Data::Hash(hash),
            ..
        }) => Ok(Some(hash)),
        Some(_) => Err(CommandError::WrongType),
        None => Ok(None),
    }
}

fn hash_mut<'a>(
    db: &'a mut Db,
    key: &[u8],
    now: Instant,
) -> Result<&'a mut BTreeMap<Vec<u8>, Vec<u8>>, CommandError> {
    if live(db, key, now).is_none() {
        db.insert(key.to_vec(), Entry::new(Data::Hash(BTreeMap::new())));
    }
    match db.get_mut(key).map(|entry| &mut entry.data) {
        Some(Data::Hash(hash)) => Ok(hash),
        _ => Err(CommandError::WrongType),
    }
}

fn list_mut<'a>(
    db: &'a mut Db,
    key: &[u8],
    now: Instant,
) -> Result<&'a mut VecDeque<Vec<u8>>, CommandError> {
    if live(db, key, now).is_none() {
        db.insert(key.to_vec(), Entry::new(Data::List(VecDeque::new())));
    }
    match db.get_mut(key).map(|entry| &mut entry.data) {
        Some(Data::List(list)) => Ok(list),
        _ => Err(CommandError::WrongType),
    }
}

fn set_mut<'a>(
    db: &'a mut Db,
    key: &[u8],
    now: Instant,
) -> Result<&'a mut BTreeSet<Vec<u8>>, CommandError> {
    if live(db, key, now).is_none() {
        db.insert(key.to_vec(), Entry::new(Data::Set(BTreeSet::new())));
    }
    match db.get_mut(key).map(|entry| &mut entry.data) {
        Some(Data::Set(set)) => Ok(set),
        _ => Err(CommandError::WrongType),
    }
}

/// Convert Redis-style inclusive, possibly negative, indices into a
/// valid inclusive range over `len` items
fn clamp_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Glob matching supporting `*` and `?`
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
