//! Lua values ↔ JSON, and descriptor tables ↔ runtime type ids.
//!
//! Every value crossing into the bridge goes through JSON: a script table
//! becomes a `serde_json::Value`, the bridge's `from_json` turns that into
//! the native type with serde defaults for missing fields. Results travel
//! back the same way through `to_json`.
//!
//! A descriptor is the global table a type is published under
//! (`Transform`, `AssetReloaded`, ...). It carries `type_id()`. Tables made
//! by a descriptor's `new{}` use the descriptor as their metatable, so an
//! instance resolves to its type without naming it again.

use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Table, Value as LuaValue};
use serde_json::Value;

use crate::reflect::RuntimeTypeId;

/// Lua registry slot holding `id → descriptor`.
const DESCRIPTORS: &str = "tarn.descriptors";

pub(crate) fn runtime_error(message: impl Into<String>) -> mlua::Error {
    mlua::Error::RuntimeError(message.into())
}

pub fn to_json(lua: &Lua, value: LuaValue) -> mlua::Result<Value> {
    lua.from_value(value)
}

/// JSON `null` becomes `nil`.
pub fn to_lua(lua: &Lua, json: &Value) -> mlua::Result<LuaValue> {
    let options = SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    lua.to_value_with(json, options)
}

fn type_id_field(table: &Table) -> mlua::Result<Option<RuntimeTypeId>> {
    match table.raw_get::<Option<Function>>("type_id")? {
        Some(f) => Ok(Some(RuntimeTypeId(f.call::<u32>(())?))),
        None => Ok(None),
    }
}

pub fn is_descriptor(table: &Table) -> bool {
    matches!(table.raw_get::<LuaValue>("type_id"), Ok(LuaValue::Function(_)))
}

/// The type a descriptor, an instance or a raw id number stands for.
pub fn type_id_of(value: &LuaValue) -> mlua::Result<Option<RuntimeTypeId>> {
    match value {
        LuaValue::Integer(raw) => Ok(u32::try_from(*raw).ok().map(RuntimeTypeId)),
        LuaValue::Table(table) => {
            if let Some(id) = type_id_field(table)? {
                return Ok(Some(id));
            }
            match table.metatable() {
                Some(meta) => type_id_field(&meta),
                None => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

pub fn require_type_id(value: &LuaValue) -> mlua::Result<RuntimeTypeId> {
    type_id_of(value)?.ok_or_else(|| {
        runtime_error(format!(
            "expected a type descriptor or instance, got {}",
            value.type_name()
        ))
    })
}

/// The JSON payload a value carries. A bare descriptor or `nil` means
/// "all defaults".
pub fn payload_of(lua: &Lua, value: LuaValue) -> mlua::Result<Value> {
    match value {
        LuaValue::Nil => Ok(Value::Object(Default::default())),
        LuaValue::Table(table) if is_descriptor(&table) => Ok(Value::Object(Default::default())),
        other => to_json(lua, other),
    }
}

/// Resolve `(descriptor_or_instance, fields?)` call arguments.
pub fn typed_payload(lua: &Lua, target: LuaValue, fields: Option<LuaValue>) -> mlua::Result<(RuntimeTypeId, Value)> {
    let id = require_type_id(&target)?;
    let payload = match fields {
        Some(fields) => payload_of(lua, fields)?,
        None => payload_of(lua, target)?,
    };
    Ok((id, payload))
}

fn descriptors(lua: &Lua) -> mlua::Result<Table> {
    match lua.named_registry_value::<Option<Table>>(DESCRIPTORS)? {
        Some(table) => Ok(table),
        None => {
            let table = lua.create_table()?;
            lua.set_named_registry_value(DESCRIPTORS, table.clone())?;
            Ok(table)
        }
    }
}

pub fn remember_descriptor(lua: &Lua, id: RuntimeTypeId, descriptor: &Table) -> mlua::Result<()> {
    descriptors(lua)?.raw_set(id.value(), descriptor.clone())
}

pub fn descriptor(lua: &Lua, id: RuntimeTypeId) -> mlua::Result<Option<Table>> {
    descriptors(lua)?.raw_get(id.value())
}

/// Convert a JSON value of type `id` for a script, tagging tables with the
/// type's descriptor.
pub fn instance(lua: &Lua, id: RuntimeTypeId, json: &Value) -> mlua::Result<LuaValue> {
    let value = to_lua(lua, json)?;
    if let LuaValue::Table(table) = &value {
        if let Some(descriptor) = descriptor(lua, id)? {
            table.set_metatable(Some(descriptor));
        }
    }
    Ok(value)
}
