mod data_type;
mod external_id;
mod models;
mod remote;

pub use data_type::DataType;
pub use external_id::{
    UNASSIGNED_STREAM_DESCRIPTION, UNASSIGNED_STREAM_UUID, normalize_external_id,
};
pub use models::{Field, KEY_FIELD_TABLE, Model, Stream, SyncRun, SyncStatus};
pub use remote::{
    AppInventory, FieldMetadataDocument, RemoteAppRecord, RemoteFieldRecord, RemoteOwner,
    RemoteStreamRef,
};
