use slotmap::new_key_type;

new_key_type! {
    pub struct ParticleSystemId;
    pub struct FieldId;
    pub struct VariableId;
    pub struct PairListId;
}
