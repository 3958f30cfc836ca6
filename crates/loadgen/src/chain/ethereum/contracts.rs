//! Bindings for the token and IBC contracts the adapter talks to.

use ethers::contract::abigen;

abigen!(
    Erc20,
    r#"[
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#
);

abigen!(
    Ics20Transfer,
    r#"[
        struct SendTransferMsg { address denom; uint256 amount; string receiver; string sourceClient; string destPort; uint64 timeoutTimestamp; string memo; }
        function sendTransfer(SendTransferMsg msg) external returns (uint64)
    ]"#
);

abigen!(
    Ics26Router,
    r#"[
        struct Payload { string sourcePort; string destPort; string version; string encoding; bytes value; }
        struct Packet { uint64 sequence; string sourceClient; string destClient; uint64 timeoutTimestamp; Payload[] payloads; }
        function getIBCApp(string portId) external view returns (address)
        event SendPacket(string indexed clientId, uint64 indexed sequence, Packet packet)
    ]"#
);

abigen!(
    RelayerHelper,
    r#"[
        function queryPacketReceipt(string clientId, uint64 sequence) external view returns (bytes32)
    ]"#
);
