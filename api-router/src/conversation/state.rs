use state_machines::state_machine;

state_machine! {
    name: ConversationMachine,
    state: ConversationState,
    initial: Ready,
    states: [Ready, OwnerResolved, Retrieved, PromptAssembled, Generated, Persisted, Indexed],
    events {
        resolve_owner { transition: { from: Ready, to: OwnerResolved } }
        retrieve { transition: { from: OwnerResolved, to: Retrieved } }
        assemble { transition: { from: Retrieved, to: PromptAssembled } }
        generate { transition: { from: PromptAssembled, to: Generated } }
        short_circuit { transition: { from: OwnerResolved, to: Generated } }
        persist { transition: { from: Generated, to: Persisted } }
        index { transition: { from: Persisted, to: Indexed } }
    }
}

pub fn ready() -> ConversationMachine<(), Ready> {
    ConversationMachine::new(())
}
